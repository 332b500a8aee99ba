use gridforge_execution::order::id::BotId;
use gridforge_instrument::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a [`Bot`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Pending,
    Active,
    Inactive,
    Failed,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BotStatus::Pending => "pending",
            BotStatus::Active => "active",
            BotStatus::Inactive => "inactive",
            BotStatus::Failed => "failed",
        })
    }
}

impl FromStr for BotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BotStatus::Pending),
            "active" => Ok(BotStatus::Active),
            "inactive" => Ok(BotStatus::Inactive),
            "failed" => Ok(BotStatus::Failed),
            other => Err(format!("unrecognised bot status '{other}'")),
        }
    }
}

/// What happened to a [`Bot`] row, carried alongside it in a bot-data notification so the Event
/// Hub can tell a client which of create/start/stop/delete produced the summary it's looking at.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BotDataAction {
    Created,
    Updated,
    Stopped,
    Deleted,
}

/// Whether the take-profit re-prices as a fixed percentage of average entry, or trails the
/// market. See the [`crate`] crate root docs and `DESIGN.md` for the trailing-mode decision.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitMode {
    Fixed,
    Trailing,
}

/// The recognised strategy parameters, validated at `create_bot`/`start_bot` time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BotParams {
    pub base_order_amount: Decimal,
    pub safety_order_amount: Decimal,
    pub max_safety_orders: u32,
    pub active_safety_orders: u32,
    pub price_deviation_pct: Decimal,
    pub price_deviation_multiplier: Decimal,
    pub safety_order_size_multiplier: Decimal,
    pub take_profit_pct: Decimal,
    pub take_profit_mode: TakeProfitMode,
    pub trailing_pct: Option<Decimal>,
    pub cooldown_between_rounds_seconds: u64,
    pub lower_price_limit: Option<Decimal>,
    pub upper_price_limit: Option<Decimal>,
}

/// A configured Martingale bot.
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub id: BotId,
    pub user_id: String,
    pub exchange_account_id: String,
    pub name: String,
    pub symbol: String,
    pub direction: Direction,
    pub status: BotStatus,
    pub params: BotParams,
    pub error_message: Option<String>,
}

/// Flat row shape matching the `bots` table, kept separate from [`Bot`] so a schema column
/// rename never has to ripple through the rest of the core.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BotRow {
    pub id: String,
    pub user_id: String,
    pub exchange_account_id: String,
    pub name: String,
    pub symbol: String,
    pub direction: String,
    pub status: String,
    pub params: serde_json::Value,
    pub error_message: Option<String>,
}

impl TryFrom<BotRow> for Bot {
    type Error = crate::error::RepositoryError;

    fn try_from(row: BotRow) -> Result<Self, Self::Error> {
        Ok(Bot {
            id: BotId::new(row.id),
            user_id: row.user_id,
            exchange_account_id: row.exchange_account_id,
            name: row.name,
            symbol: row.symbol,
            direction: match row.direction.as_str() {
                "short" => Direction::Short,
                _ => Direction::Long,
            },
            status: row
                .status
                .parse()
                .map_err(|_| crate::error::RepositoryError::NotFound)?,
            params: serde_json::from_value(row.params)?,
            error_message: row.error_message,
        })
    }
}
