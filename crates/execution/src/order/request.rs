use crate::order::{
    id::OrderId,
    state::Cancelled,
    OrderEvent, OrderKind, TimeInForce,
};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type OrderRequestOpen = OrderEvent<RequestOpen>;
pub type OrderRequestCancel = OrderEvent<RequestCancel>;
pub type OrderResponseCancel = OrderEvent<Result<Cancelled, crate::error::OrderError>>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct RequestOpen {
    pub side: gridforge_instrument::Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub kind: OrderKind,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize, Constructor)]
pub struct RequestCancel {
    pub id: Option<OrderId>,
}
