use crate::order::id::OrderId;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use gridforge_instrument::{instrument::InstrumentNameExchange, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display, From, Constructor)]
pub struct TradeId(pub SmolStr);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Trade {
    pub id: TradeId,
    pub instrument: InstrumentNameExchange,
    pub order_id: OrderId,
    pub time_exchange: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fees: AssetFees,
}

impl Trade {
    pub fn value_quote(&self) -> Decimal {
        self.price * self.quantity.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct AssetFees {
    pub asset: Option<gridforge_instrument::asset::AssetNameExchange>,
    pub fees: Decimal,
}

impl Default for AssetFees {
    fn default() -> Self {
        Self {
            asset: None,
            fees: Decimal::ZERO,
        }
    }
}
