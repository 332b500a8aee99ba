use crate::error::RepositoryError;
use crate::models::cycle::{Cycle, CycleId, CycleRow, CycleStatus, NewCycle};
use gridforge_execution::order::id::BotId;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;

const CYCLE_COLUMNS: &str = "id, bot_id, cycle_number, status, started_at, completed_at, \
    base_fill_price, average_entry_price, total_base_quantity, total_quote_invested, \
    realized_profit";

/// Durable record of each bot's cycles, backing the Cycle Manager's state machine. The partial
/// unique index on `(bot_id) WHERE status = 'active'` is what enforces "exactly one active cycle
/// per bot" at the database level, not just in memory.
#[derive(Debug, Clone)]
pub struct CycleRepository {
    pool: PgPool,
}

impl CycleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn start_cycle(&self, new_cycle: NewCycle) -> Result<Cycle, RepositoryError> {
        let id = CycleId::random();

        let row = sqlx::query_as::<_, CycleRow>(&format!(
            r#"
            INSERT INTO bot_cycles (id, bot_id, cycle_number, status, started_at, total_base_quantity, total_quote_invested)
            VALUES ($1, $2, $3, 'active', now(), 0, 0)
            RETURNING {CYCLE_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(new_cycle.bot_id.0.as_str())
        .bind(new_cycle.cycle_number)
        .fetch_one(&self.pool)
        .await?;

        info!(cycle_id = %row.id, bot_id = %row.bot_id, "cycle started");
        row.try_into()
    }

    pub async fn find(&self, cycle_id: CycleId) -> Result<Cycle, RepositoryError> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM bot_cycles WHERE id = $1"
        ))
        .bind(cycle_id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// The bot's current active cycle, if any. At most one ever exists.
    pub async fn find_active_for_bot(
        &self,
        bot_id: &BotId,
    ) -> Result<Option<Cycle>, RepositoryError> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM bot_cycles WHERE bot_id = $1 AND status = 'active'"
        ))
        .bind(bot_id.0.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_by_bot(&self, bot_id: &BotId) -> Result<Vec<Cycle>, RepositoryError> {
        let rows = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {CYCLE_COLUMNS} FROM bot_cycles WHERE bot_id = $1 ORDER BY cycle_number"
        ))
        .bind(bot_id.0.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Applies a base or safety fill: bumps `total_base_quantity`/`total_quote_invested` and
    /// recomputes `average_entry_price`, for both the base fill and every subsequent safety fill.
    pub async fn apply_fill(
        &self,
        cycle_id: CycleId,
        base_fill_price: Option<Decimal>,
        total_base_quantity: Decimal,
        total_quote_invested: Decimal,
        average_entry_price: Decimal,
    ) -> Result<Cycle, RepositoryError> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            r#"
            UPDATE bot_cycles
            SET
                base_fill_price = COALESCE($2, base_fill_price),
                total_base_quantity = $3,
                total_quote_invested = $4,
                average_entry_price = $5
            WHERE id = $1
            RETURNING {CYCLE_COLUMNS}
            "#
        ))
        .bind(cycle_id.0)
        .bind(base_fill_price)
        .bind(total_base_quantity)
        .bind(total_quote_invested)
        .bind(average_entry_price)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Terminates a cycle as `completed`, `aborted` or `failed`, stamping `completed_at` and
    /// `realized_profit`. `status` must not be [`CycleStatus::Active`]. Only `completed` resets
    /// `total_base_quantity` to 0 - the take-profit fill that reaches `completed` always clears
    /// the whole position, but `aborted`/`failed` cycles keep their last known quantity, since
    /// that figure is what was actually liquidated (or never acquired, for a base-order failure).
    pub async fn finish(
        &self,
        cycle_id: CycleId,
        status: CycleStatus,
        realized_profit: Option<Decimal>,
    ) -> Result<Cycle, RepositoryError> {
        debug_assert!(status.is_terminal());

        let row = sqlx::query_as::<_, CycleRow>(&format!(
            r#"
            UPDATE bot_cycles
            SET
                status = $2,
                completed_at = now(),
                realized_profit = $3,
                total_base_quantity = CASE WHEN $2 = 'completed' THEN 0 ELSE total_base_quantity END
            WHERE id = $1
            RETURNING {CYCLE_COLUMNS}
            "#
        ))
        .bind(cycle_id.0)
        .bind(status.to_string())
        .bind(realized_profit)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        info!(cycle_id = %row.id, status = %status, "cycle finished");
        row.try_into()
    }
}
