use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use gridforge_execution::order::id::BotId;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifies a single `bot_cycles` row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From)]
pub struct CycleId(pub Uuid);

impl CycleId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Lifecycle status of one [`Cycle`]'s state machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CycleStatus {
    Active,
    Completed,
    Aborted,
    Failed,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleStatus::Active => "active",
            CycleStatus::Completed => "completed",
            CycleStatus::Aborted => "aborted",
            CycleStatus::Failed => "failed",
        })
    }
}

impl FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CycleStatus::Active),
            "completed" => Ok(CycleStatus::Completed),
            "aborted" => Ok(CycleStatus::Aborted),
            "failed" => Ok(CycleStatus::Failed),
            other => Err(format!("unrecognised cycle status '{other}'")),
        }
    }
}

impl CycleStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CycleStatus::Active)
    }
}

/// One open-to-close round trip of a bot.
#[derive(Debug, Clone, Constructor)]
pub struct NewCycle {
    pub bot_id: BotId,
    pub cycle_number: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub id: CycleId,
    pub bot_id: BotId,
    pub cycle_number: i32,
    pub status: CycleStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub base_fill_price: Option<Decimal>,
    pub average_entry_price: Option<Decimal>,
    pub total_base_quantity: Decimal,
    pub total_quote_invested: Decimal,
    pub realized_profit: Option<Decimal>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CycleRow {
    pub id: Uuid,
    pub bot_id: String,
    pub cycle_number: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub base_fill_price: Option<Decimal>,
    pub average_entry_price: Option<Decimal>,
    pub total_base_quantity: Decimal,
    pub total_quote_invested: Decimal,
    pub realized_profit: Option<Decimal>,
}

impl TryFrom<CycleRow> for Cycle {
    type Error = crate::error::RepositoryError;

    fn try_from(row: CycleRow) -> Result<Self, Self::Error> {
        Ok(Cycle {
            id: CycleId(row.id),
            bot_id: BotId::new(row.bot_id),
            cycle_number: row.cycle_number,
            status: row
                .status
                .parse()
                .map_err(|_| crate::error::RepositoryError::NotFound)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            base_fill_price: row.base_fill_price,
            average_entry_price: row.average_entry_price,
            total_base_quantity: row.total_base_quantity,
            total_quote_invested: row.total_quote_invested,
            realized_profit: row.realized_profit,
        })
    }
}
