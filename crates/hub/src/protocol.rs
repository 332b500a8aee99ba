//! Wire types for the Event Hub's single WebSocket endpoint. Client messages are internally
//! tagged on `type`; server messages follow the same shape so a client can dispatch on one field
//! regardless of direction.

use chrono::{DateTime, Utc};
use gridforge_execution::balance::AssetBalance;
use gridforge_execution::market::{KlineUpdate, TickerUpdate};
use gridforge_persistence::models::{
    bot::{Bot, BotDataAction as BotDataActionCore, BotStatus},
    cycle::{Cycle, CycleStatus},
    order::OrderStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        user_id: String,
        #[serde(default)]
        token: Option<String>,
    },
    Subscribe {
        symbols: Vec<String>,
    },
    ConfigureStream {
        #[serde(rename = "dataType")]
        data_type: StreamDataType,
        symbols: Vec<String>,
        #[serde(default)]
        interval: Option<String>,
    },
    GetBalance {
        exchange_id: String,
        #[serde(default)]
        asset: Option<String>,
    },
    Unsubscribe,
    ChangeSubscription {
        symbol: String,
        #[serde(default)]
        interval: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDataType {
    Kline,
    Ticker,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected,
    TickerUpdate {
        data: TickerPayload,
    },
    KlineUpdate {
        data: KlinePayload,
    },
    HistoricalKlines {
        data: Vec<KlinePayload>,
    },
    BalanceUpdate {
        exchange_id: String,
        data: BalancePayload,
    },
    BalanceError {
        exchange_id: String,
        error: String,
    },
    BotStatusUpdate {
        data: BotStatusPayload,
    },
    BotDataUpdate {
        data: BotDataPayload,
    },
    BotCycleUpdate {
        data: BotCyclePayload,
    },
    OrderFillNotification {
        data: OrderEventPayload,
    },
    OrderStatusUpdate {
        data: OrderEventPayload,
    },
}

impl ServerMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerPayload {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<TickerUpdate> for TickerPayload {
    fn from(update: TickerUpdate) -> Self {
        Self {
            symbol: update.symbol,
            price: update.price,
            timestamp: update.time_exchange,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KlinePayload {
    pub symbol: String,
    pub interval: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
    pub is_closed: bool,
}

impl From<KlineUpdate> for KlinePayload {
    fn from(update: KlineUpdate) -> Self {
        Self {
            symbol: update.symbol,
            interval: update.interval,
            open: update.open,
            high: update.high,
            low: update.low,
            close: update.close,
            volume: update.volume,
            close_time: update.close_time,
            is_closed: update.is_closed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalancePayload {
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStatusPayload {
    #[serde(rename = "botId")]
    pub bot_id: String,
    pub status: BotStatus,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub message: Option<String>,
}

impl From<&Bot> for BotStatusPayload {
    fn from(bot: &Bot) -> Self {
        Self {
            bot_id: bot.id.0.to_string(),
            status: bot.status,
            is_active: bot.status == BotStatus::Active,
            message: bot.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotDataAction {
    Created,
    Updated,
    Stopped,
    Deleted,
}

impl From<BotDataActionCore> for BotDataAction {
    fn from(action: BotDataActionCore) -> Self {
        match action {
            BotDataActionCore::Created => Self::Created,
            BotDataActionCore::Updated => Self::Updated,
            BotDataActionCore::Stopped => Self::Stopped,
            BotDataActionCore::Deleted => Self::Deleted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BotDataPayload {
    pub action: BotDataAction,
    pub bot: BotSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotSummary {
    pub id: String,
    pub user_id: String,
    pub exchange_account_id: String,
    pub name: String,
    pub symbol: String,
    pub status: BotStatus,
    pub error_message: Option<String>,
}

impl From<&Bot> for BotSummary {
    fn from(bot: &Bot) -> Self {
        Self {
            id: bot.id.0.to_string(),
            user_id: bot.user_id.clone(),
            exchange_account_id: bot.exchange_account_id.clone(),
            name: bot.name.clone(),
            symbol: bot.symbol.clone(),
            status: bot.status,
            error_message: bot.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleAction {
    Started,
    Updated,
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotCyclePayload {
    pub action: CycleAction,
    pub cycle: CycleSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub id: String,
    pub bot_id: String,
    pub cycle_number: i32,
    pub status: CycleStatusWire,
    pub average_entry_price: Option<Decimal>,
    pub total_base_quantity: Decimal,
    pub total_quote_invested: Decimal,
    pub realized_profit: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatusWire {
    Active,
    Completed,
    Aborted,
    Failed,
}

impl From<CycleStatus> for CycleStatusWire {
    fn from(status: CycleStatus) -> Self {
        match status {
            CycleStatus::Active => Self::Active,
            CycleStatus::Completed => Self::Completed,
            CycleStatus::Aborted => Self::Aborted,
            CycleStatus::Failed => Self::Failed,
        }
    }
}

impl From<&Cycle> for CycleSummary {
    fn from(cycle: &Cycle) -> Self {
        Self {
            id: cycle.id.0.to_string(),
            bot_id: cycle.bot_id.0.to_string(),
            cycle_number: cycle.cycle_number,
            status: cycle.status.into(),
            average_entry_price: cycle.average_entry_price,
            total_base_quantity: cycle.total_base_quantity,
            total_quote_invested: cycle.total_quote_invested,
            realized_profit: cycle.realized_profit,
        }
    }
}

impl BotCyclePayload {
    pub fn new(cycle: &Cycle) -> Self {
        let action = if cycle.status.is_terminal() {
            CycleAction::Finished
        } else if cycle.base_fill_price.is_some() {
            CycleAction::Updated
        } else {
            CycleAction::Started
        };

        Self {
            action,
            cycle: cycle.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEventPayload {
    pub bot_id: String,
    pub client_order_id: String,
    pub status: String,
    pub filled_price: Option<Decimal>,
    pub filled_quantity: Decimal,
}

/// `OrderStatus` has no `Display` impl in `gridforge-persistence` - it's a storage-layer enum,
/// not a wire format - so the mapping lives here, next to the rest of the protocol.
pub fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::PendingPlacement => "pending_placement",
        OrderStatus::Open => "open",
        OrderStatus::PartiallyFilled => "partially_filled",
        OrderStatus::Filled => "filled",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Failed => "failed",
    }
}
