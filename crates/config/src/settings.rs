use serde::Deserialize;

/// Process-wide configuration, loaded by [`crate::load_config`] from `config.toml` plus
/// environment overrides (`PORT`, `WS_PORT`, `DATABASE_URL`, `ALLOWED_ORIGINS`).
///
/// `ENCRYPTION_KEY` is read directly by the credential collaborator that decrypts exchange API
/// secrets before handing them to the core - this struct never reads it, so it is deliberately
/// absent here.
#[derive(Debug, Clone, Deserialize)]
pub struct GridforgeConfig {
    /// HTTP port for the core RPC surface.
    pub port: u16,
    /// Optional separate port for the Event Hub's WebSocket endpoint; falls back to `port` when
    /// unset, for running the RPC surface and the event stream on different ports in development.
    pub ws_port: Option<u16>,
    pub database_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// One entry per configured `ExchangeAccount`, read from `config.toml`'s
    /// `[[exchange_accounts]]` array. `api_key`/`api_secret` arrive already decrypted - the
    /// credential collaborator that decrypts them at rest is out of scope here.
    #[serde(default)]
    pub exchange_accounts: Vec<ExchangeAccountConfig>,
}

impl GridforgeConfig {
    /// The port the Event Hub's WebSocket server should bind to.
    pub fn effective_ws_port(&self) -> u16 {
        self.ws_port.unwrap_or(self.port)
    }
}

/// A single configured exchange account: which venue it trades on, its already-decrypted API
/// credentials, and the account identifier bots and Event Hub `get_balance` requests reference.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeAccountConfig {
    pub id: String,
    pub display_name: String,
    pub kind: ExchangeAccountKind,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeAccountKind {
    Live,
    Testnet,
}
