use crate::order::{
    id::{BotId, ClientOrderId},
    request::{OrderRequestCancel, RequestCancel},
    state::{ActiveOrderState, Cancelled, InactiveOrderState, Open, OpenInFlight, OrderState},
};
use derive_more::{Constructor, Display};
use gridforge_instrument::{instrument::InstrumentNameExchange, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order related identifiers: [`id::ClientOrderId`], [`id::OrderId`], [`id::BotId`].
pub mod id;

/// Order lifecycle states: [`state::ActiveOrderState`], [`state::InactiveOrderState`].
pub mod state;

/// Order open/cancel request types.
pub mod request;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct OrderEvent<State> {
    pub key: OrderKey,
    pub state: State,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Constructor)]
pub struct OrderKey {
    pub instrument: InstrumentNameExchange,
    pub bot: BotId,
    pub cid: ClientOrderId,
}

/// An order, parameterised by its lifecycle `State` (typically [`OrderState`], or one of its
/// variants once narrowed via [`Order::to_active`]/[`Order::to_inactive`]).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Order<State = OrderState> {
    pub key: OrderKey,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub kind: OrderKind,
    pub time_in_force: TimeInForce,
    pub state: State,
}

impl Order<OrderState> {
    pub fn to_active(&self) -> Option<Order<ActiveOrderState>> {
        let OrderState::Active(state) = &self.state else {
            return None;
        };

        Some(Order {
            key: self.key.clone(),
            side: self.side,
            price: self.price,
            quantity: self.quantity,
            kind: self.kind,
            time_in_force: self.time_in_force,
            state: state.clone(),
        })
    }

    pub fn to_inactive(&self) -> Option<Order<InactiveOrderState>> {
        let OrderState::Inactive(state) = &self.state else {
            return None;
        };

        Some(Order {
            key: self.key.clone(),
            side: self.side,
            price: self.price,
            quantity: self.quantity,
            kind: self.kind,
            time_in_force: self.time_in_force,
            state: state.clone(),
        })
    }
}

impl Order<ActiveOrderState> {
    pub fn to_request_cancel(&self) -> Option<OrderRequestCancel> {
        let request_cancel = match &self.state {
            ActiveOrderState::OpenInFlight(_) => RequestCancel { id: None },
            ActiveOrderState::Open(open) => RequestCancel {
                id: Some(open.id.clone()),
            },
            _ => return None,
        };

        Some(OrderRequestCancel {
            key: self.key.clone(),
            state: request_cancel,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum OrderKind {
    Market,
    Limit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum TimeInForce {
    GoodUntilCancelled { post_only: bool },
    FillOrKill,
    ImmediateOrCancel,
}

impl From<&request::OrderRequestOpen> for Order<ActiveOrderState> {
    fn from(value: &request::OrderRequestOpen) -> Self {
        let request::OrderRequestOpen { key, state } = value;

        Self {
            key: key.clone(),
            side: state.side,
            price: state.price,
            quantity: state.quantity,
            kind: state.kind,
            time_in_force: state.time_in_force,
            state: ActiveOrderState::OpenInFlight(OpenInFlight),
        }
    }
}

impl From<Order<Open>> for Order<ActiveOrderState> {
    fn from(value: Order<Open>) -> Self {
        Order {
            key: value.key,
            side: value.side,
            price: value.price,
            quantity: value.quantity,
            kind: value.kind,
            time_in_force: value.time_in_force,
            state: ActiveOrderState::Open(value.state),
        }
    }
}

impl From<Order<Open>> for Order<OrderState> {
    fn from(value: Order<Open>) -> Self {
        Order {
            key: value.key,
            side: value.side,
            price: value.price,
            quantity: value.quantity,
            kind: value.kind,
            time_in_force: value.time_in_force,
            state: OrderState::Active(ActiveOrderState::Open(value.state)),
        }
    }
}

impl From<Order<Cancelled>> for Order<OrderState> {
    fn from(value: Order<Cancelled>) -> Self {
        Order {
            key: value.key,
            side: value.side,
            price: value.price,
            quantity: value.quantity,
            kind: value.kind,
            time_in_force: value.time_in_force,
            state: OrderState::Inactive(InactiveOrderState::Cancelled(value.state)),
        }
    }
}
