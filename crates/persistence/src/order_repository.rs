use crate::error::RepositoryError;
use crate::models::cycle::CycleId;
use crate::models::order::{NewOrder, Order, OrderRecordId, OrderRow, OrderStatus};
use gridforge_execution::order::id::{BotId, OrderId as ExchangeOrderId};
use gridforge_instrument::Side;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, warn};

/// An execution report as delivered by the Exchange Gateway's user-data stream, trimmed to the
/// fields the Order Repository needs to reconcile a persisted order (see `open_user_stream`'s
/// event shape).
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub status: OrderStatus,
    pub filled_price: Option<Decimal>,
    pub filled_quantity: Decimal,
}

fn side_str(side: Side) -> String {
    side.to_string()
}

fn kind_str(kind: gridforge_execution::order::OrderKind) -> &'static str {
    match kind {
        gridforge_execution::order::OrderKind::Market => "market",
        gridforge_execution::order::OrderKind::Limit => "limit",
    }
}

/// The durable, transactional record of every order the core has issued, keyed by
/// `client_order_id` for crash-safe idempotent recovery.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes a new order row in `pending_placement` before any network call. A crash between
    /// this write and the exchange ack leaves a recoverable trace keyed by `client_order_id`.
    pub async fn reserve(&self, new_order: NewOrder) -> Result<Order, RepositoryError> {
        let id = OrderRecordId::random();

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO cycle_orders (
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_quantity, status, client_order_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 'pending_placement', $9, now(), now())
            RETURNING
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_price, filled_quantity, status, exchange_order_id, client_order_id,
                created_at, updated_at
            "#,
        )
        .bind(id.0)
        .bind(new_order.cycle_id.0)
        .bind(new_order.bot_id.0.as_str())
        .bind(new_order.role.to_string())
        .bind(side_str(new_order.side))
        .bind(kind_str(new_order.kind))
        .bind(new_order.intended_price)
        .bind(new_order.intended_quantity)
        .bind(new_order.client_order_id.0.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!(order_id = %row.id, client_order_id = %row.client_order_id, "order reserved");

        row.try_into()
    }

    /// Records the exchange's acknowledgement of a placement, attaching its `exchange_order_id`
    /// and moving the order to `open`.
    pub async fn mark_submitted(
        &self,
        client_order_id: &str,
        exchange_order_id: &ExchangeOrderId,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE cycle_orders
            SET exchange_order_id = $2, status = 'open', updated_at = now()
            WHERE client_order_id = $1 AND status = 'pending_placement'
            RETURNING
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_price, filled_quantity, status, exchange_order_id, client_order_id,
                created_at, updated_at
            "#,
        )
        .bind(client_order_id)
        .bind(exchange_order_id.0.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Applies an execution report to the order it references, atomically. Idempotent under
    /// duplicate reports: a report whose `(filled_quantity, status)` matches what is already
    /// stored is a no-op; a report attempting a non-monotonic transition is rejected rather than
    /// silently applied (terminal order states never transition again).
    pub async fn apply_execution_report(
        &self,
        report: ExecutionReport,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_price, filled_quantity, status, exchange_order_id, client_order_id,
                created_at, updated_at
            FROM cycle_orders
            WHERE client_order_id = $1
            FOR UPDATE
            "#,
        )
        .bind(&report.client_order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let current: Order = current.try_into()?;

        if current.status == report.status && current.filled_quantity == report.filled_quantity {
            tx.commit().await?;
            return Ok(current);
        }

        if !current.status.can_transition_to(report.status) {
            warn!(
                order_id = %current.id,
                from = %current.status,
                to = %report.status,
                "rejecting non-monotonic execution report"
            );
            tx.rollback().await?;
            return Err(RepositoryError::NonMonotonicTransition {
                order_id: current.id.0,
                from: current.status.to_string(),
                to: report.status.to_string(),
            });
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE cycle_orders
            SET
                filled_price = COALESCE($2, filled_price),
                filled_quantity = $3,
                status = $4,
                exchange_order_id = COALESCE($5, exchange_order_id),
                updated_at = now()
            WHERE client_order_id = $1
            RETURNING
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_price, filled_quantity, status, exchange_order_id, client_order_id,
                created_at, updated_at
            "#,
        )
        .bind(&report.client_order_id)
        .bind(report.filled_price)
        .bind(report.filled_quantity)
        .bind(report.status.to_string())
        .bind(report.exchange_order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_id = %row.id,
            status = %row.status,
            filled_quantity = %row.filled_quantity,
            "execution report applied"
        );

        row.try_into()
    }

    /// Marks `order_id` `cancelled`. A no-op if the order is already in a terminal status.
    pub async fn mark_cancelled(&self, order_id: OrderRecordId) -> Result<Order, RepositoryError> {
        self.mark_terminal(order_id, OrderStatus::Cancelled, None)
            .await
    }

    /// Marks `order_id` `failed`, recording `reason` for diagnostics (not currently persisted as
    /// a column - surfaced via the `tracing` event only; detailed diagnostics live in the logs,
    /// not the row.
    pub async fn mark_failed(
        &self,
        order_id: OrderRecordId,
        reason: &str,
    ) -> Result<Order, RepositoryError> {
        warn!(%order_id, reason, "marking order failed");
        self.mark_terminal(order_id, OrderStatus::Failed, None)
            .await
    }

    async fn mark_terminal(
        &self,
        order_id: OrderRecordId,
        status: OrderStatus,
        filled_quantity: Option<Decimal>,
    ) -> Result<Order, RepositoryError> {
        let current = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders WHERE id = $1",
        )
        .bind(order_id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let current: Order = current.try_into()?;
        if current.status.is_terminal() {
            return Ok(current);
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE cycle_orders
            SET status = $2, filled_quantity = COALESCE($3, filled_quantity), updated_at = now()
            WHERE id = $1
            RETURNING
                id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity,
                filled_price, filled_quantity, status, exchange_order_id, client_order_id,
                created_at, updated_at
            "#,
        )
        .bind(order_id.0)
        .bind(status.to_string())
        .bind(filled_quantity)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    pub async fn find_by_client_order_id(
        &self,
        client_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders WHERE client_order_id = $1",
        )
        .bind(client_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Looks an order up by the exchange's own id, for matching fills delivered by a trade stream
    /// that only ever echoes back `order_id`, never `client_order_id`.
    pub async fn find_by_exchange_order_id(
        &self,
        exchange_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders WHERE exchange_order_id = $1",
        )
        .bind(exchange_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_by_cycle(&self, cycle_id: CycleId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders WHERE cycle_id = $1 ORDER BY created_at",
        )
        .bind(cycle_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_by_bot(&self, bot_id: &BotId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders WHERE bot_id = $1 ORDER BY created_at",
        )
        .bind(bot_id.0.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn list_non_terminal_by_bot(
        &self,
        bot_id: &BotId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, cycle_id, bot_id, role, side, kind, intended_price, intended_quantity, \
             filled_price, filled_quantity, status, exchange_order_id, client_order_id, \
             created_at, updated_at FROM cycle_orders \
             WHERE bot_id = $1 AND status NOT IN ('filled', 'cancelled', 'rejected', 'failed') \
             ORDER BY created_at",
        )
        .bind(bot_id.0.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Sum of `filled_quantity * filled_price` for `filled` orders of `role` within `cycle_id`,
    /// used by the Cycle Manager to compute `realized_profit` from the Order Repository's filled
    /// rows rather than running totals, so the figure can't drift from what actually filled.
    pub async fn filled_quote_total(
        &self,
        cycle_id: CycleId,
        side: Side,
    ) -> Result<Decimal, RepositoryError> {
        let total: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(filled_price * filled_quantity) FROM cycle_orders \
             WHERE cycle_id = $1 AND side = $2 AND status = 'filled'",
        )
        .bind(cycle_id.0)
        .bind(side_str(side))
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    /// Moves every order belonging to `bot_id` into `archived_orders`, then deletes them from
    /// `cycle_orders`. Called by `delete_bot_cascade` before the `bots` row itself is deleted -
    /// see the archival decision in `DESIGN.md`.
    pub async fn archive_bot_orders(&self, bot_id: &BotId) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let archived = sqlx::query(
            r#"
            INSERT INTO archived_orders
            SELECT *, now() AS archived_at FROM cycle_orders WHERE bot_id = $1
            "#,
        )
        .bind(bot_id.0.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM cycle_orders WHERE bot_id = $1")
            .bind(bot_id.0.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(archived)
    }
}
