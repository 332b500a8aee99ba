use chrono::{DateTime, Utc};
use derive_more::Constructor;
use gridforge_instrument::asset::AssetNameExchange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct AssetBalance {
    pub asset: AssetNameExchange,
    pub balance: Balance,
    pub time_exchange: DateTime<Utc>,
}

/// `total`/`free` are exact - every monetary quantity in Gridforge is a [`Decimal`], never a
/// binary float, so balance comparisons against an order's notional never drift.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize, Constructor)]
pub struct Balance {
    pub total: Decimal,
    pub free: Decimal,
}

impl Balance {
    pub fn used(&self) -> Decimal {
        self.total - self.free
    }
}
