use crate::error::RepositoryError;
use crate::models::bot::{Bot, BotParams, BotRow, BotStatus};
use gridforge_execution::order::id::BotId;
use gridforge_instrument::Direction;
use sqlx::PgPool;
use tracing::info;

/// Durable record of configured bots, backing the Bot Supervisor's lifecycle operations.
#[derive(Debug, Clone)]
pub struct BotRepository {
    pool: PgPool,
}

const BOT_COLUMNS: &str = "id, user_id, exchange_account_id, name, symbol, direction, status, \
    params, error_message";

impl BotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a newly validated bot in `pending` status. Does not place any order - that is
    /// `start_bot`'s job.
    pub async fn create_bot(
        &self,
        user_id: &str,
        exchange_account_id: &str,
        name: &str,
        symbol: &str,
        direction: Direction,
        params: &BotParams,
    ) -> Result<Bot, RepositoryError> {
        let id = BotId::random();
        let direction_str = if direction == Direction::Short {
            "short"
        } else {
            "long"
        };
        let params_json = serde_json::to_value(params)?;

        let row = sqlx::query_as::<_, BotRow>(&format!(
            r#"
            INSERT INTO bots (id, user_id, exchange_account_id, name, strategy, symbol, direction, status, params)
            VALUES ($1, $2, $3, $4, 'martingale', $5, $6, 'pending', $7)
            RETURNING {BOT_COLUMNS}
            "#
        ))
        .bind(id.0.as_str())
        .bind(user_id)
        .bind(exchange_account_id)
        .bind(name)
        .bind(symbol)
        .bind(direction_str)
        .bind(params_json)
        .fetch_one(&self.pool)
        .await?;

        info!(bot_id = %row.id, "bot created");
        row.try_into()
    }

    pub async fn find(&self, bot_id: &BotId) -> Result<Bot, RepositoryError> {
        let row = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots WHERE id = $1"
        ))
        .bind(bot_id.0.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    pub async fn list_active(&self) -> Result<Vec<Bot>, RepositoryError> {
        let rows = sqlx::query_as::<_, BotRow>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots WHERE status = 'active'"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn set_status(
        &self,
        bot_id: &BotId,
        status: BotStatus,
        error_message: Option<&str>,
    ) -> Result<Bot, RepositoryError> {
        let row = sqlx::query_as::<_, BotRow>(&format!(
            r#"
            UPDATE bots SET status = $2, error_message = $3, updated_at = now()
            WHERE id = $1
            RETURNING {BOT_COLUMNS}
            "#
        ))
        .bind(bot_id.0.as_str())
        .bind(status.to_string())
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        info!(bot_id = %row.id, status = %status, "bot status updated");
        row.try_into()
    }

    /// Deletes `bot_id` and, via `ON DELETE CASCADE`, its cycles. Callers must archive the bot's
    /// orders (see [`crate::order_repository::OrderRepository::archive_bot_orders`]) before
    /// calling this, since that archival is what `delete_bot` promises.
    pub async fn delete(&self, bot_id: &BotId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM bots WHERE id = $1")
            .bind(bot_id.0.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
