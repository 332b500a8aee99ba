#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Gridforge-Config
//! Typed process configuration: an optional `config.toml` overridden by environment variables,
//! following the `configuration` crate's `load_config`/`Config` pattern.

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{ExchangeAccountConfig, ExchangeAccountKind, GridforgeConfig};

/// Loads [`GridforgeConfig`] from `config.toml` (if present) overridden by environment
/// variables, after loading a `.env` file if one exists.
pub fn load_config() -> Result<GridforgeConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = config::Config::builder()
        .set_default("port", 8080)?
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(
            config::Environment::default()
                .list_separator(",")
                .with_list_parse_key("allowed_origins"),
        )
        .build()?;

    let config = builder.try_deserialize::<GridforgeConfig>()?;

    if config.database_url.is_empty() {
        return Err(ConfigError::validation("DATABASE_URL must be set"));
    }

    Ok(config)
}
