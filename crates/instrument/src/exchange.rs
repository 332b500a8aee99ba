use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies the execution venue an `ExchangeAccount` connects to. Every variant speaks the
/// same Binance-compatible REST/WS dialect; the variant only distinguishes base URLs and
/// rate-limit tiers.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename = "exchange", rename_all = "snake_case")]
pub enum ExchangeId {
    BinanceSpot,
    BinanceSpotTestnet,
    /// Any other execution venue speaking the same dialect, identified by
    /// its `ExchangeAccount.display_name`.
    Other,
}

impl ExchangeId {
    /// Whether this venue is a paper/testnet venue, per an `ExchangeAccount`'s `kind` field.
    pub fn is_testnet(&self) -> bool {
        matches!(self, ExchangeId::BinanceSpotTestnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testnet_detection() {
        assert!(ExchangeId::BinanceSpotTestnet.is_testnet());
        assert!(!ExchangeId::BinanceSpot.is_testnet());
    }
}
