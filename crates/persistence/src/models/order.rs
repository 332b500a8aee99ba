use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use gridforge_execution::order::{
    id::{BotId, ClientOrderId, OrderId as ExchangeOrderId},
    OrderKind,
};
use gridforge_instrument::Side;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifies a single `cycle_orders` (or `archived_orders`) row - our own id, distinct from
/// the exchange's [`ExchangeOrderId`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From)]
pub struct OrderRecordId(pub Uuid);

impl OrderRecordId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// What role an order plays within its cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OrderRole {
    Base,
    Safety,
    TakeProfit,
    Liquidation,
}

impl fmt::Display for OrderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderRole::Base => "base",
            OrderRole::Safety => "safety",
            OrderRole::TakeProfit => "take_profit",
            OrderRole::Liquidation => "liquidation",
        })
    }
}

impl FromStr for OrderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(OrderRole::Base),
            "safety" => Ok(OrderRole::Safety),
            "take_profit" => Ok(OrderRole::TakeProfit),
            "liquidation" => Ok(OrderRole::Liquidation),
            other => Err(format!("unrecognised order role '{other}'")),
        }
    }
}

/// Lifecycle status of a persisted order. Terminal statuses are immutable.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OrderStatus {
    PendingPlacement,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal, monotonic transition. Terminal states
    /// never move; `PendingPlacement -> Open -> PartiallyFilled -> Filled` only ever advances.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (PendingPlacement, Open | PartiallyFilled | Filled | Cancelled | Rejected | Failed)
                | (Open, PartiallyFilled | Filled | Cancelled | Failed)
                | (PartiallyFilled, Filled | Cancelled | Failed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::PendingPlacement => "pending_placement",
            OrderStatus::Open => "open",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Failed => "failed",
        })
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_placement" => Ok(OrderStatus::PendingPlacement),
            "open" => Ok(OrderStatus::Open),
            "partially_filled" => Ok(OrderStatus::PartiallyFilled),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unrecognised order status '{other}'")),
        }
    }
}

/// A freshly computed order, not yet written anywhere. Passed to
/// [`crate::order_repository::OrderRepository::reserve`] before any network call.
#[derive(Debug, Clone, Constructor)]
pub struct NewOrder {
    pub cycle_id: super::cycle::CycleId,
    pub bot_id: BotId,
    pub role: OrderRole,
    pub side: Side,
    pub kind: OrderKind,
    pub intended_price: Option<Decimal>,
    pub intended_quantity: Decimal,
    pub client_order_id: ClientOrderId,
}

/// One row of the `Order` entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderRecordId,
    pub cycle_id: super::cycle::CycleId,
    pub bot_id: BotId,
    pub role: OrderRole,
    pub side: Side,
    pub kind: OrderKind,
    pub intended_price: Option<Decimal>,
    pub intended_quantity: Decimal,
    pub filled_price: Option<Decimal>,
    pub filled_quantity: Decimal,
    pub status: OrderStatus,
    pub exchange_order_id: Option<ExchangeOrderId>,
    pub client_order_id: ClientOrderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub bot_id: String,
    pub role: String,
    pub side: String,
    pub kind: String,
    pub intended_price: Option<Decimal>,
    pub intended_quantity: Decimal,
    pub filled_price: Option<Decimal>,
    pub filled_quantity: Decimal,
    pub status: String,
    pub exchange_order_id: Option<String>,
    pub client_order_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = crate::error::RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderRecordId(row.id),
            cycle_id: super::cycle::CycleId(row.cycle_id),
            bot_id: BotId::new(row.bot_id),
            role: row
                .role
                .parse()
                .map_err(|_| crate::error::RepositoryError::NotFound)?,
            side: match row.side.as_str() {
                "sell" => Side::Sell,
                _ => Side::Buy,
            },
            kind: match row.kind.as_str() {
                "market" => OrderKind::Market,
                _ => OrderKind::Limit,
            },
            intended_price: row.intended_price,
            intended_quantity: row.intended_quantity,
            filled_price: row.filled_price,
            filled_quantity: row.filled_quantity,
            status: row
                .status
                .parse()
                .map_err(|_| crate::error::RepositoryError::NotFound)?,
            exchange_order_id: row.exchange_order_id.map(ExchangeOrderId::new),
            client_order_id: ClientOrderId::new(row.client_order_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
