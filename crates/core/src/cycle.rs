use crate::{
    error::CoreError,
    event::{CycleEvent, ExecutionReportEvent},
    ladder::{compute_ladder, rung_order_amount, rung_trigger_price, take_profit_price, SafetyRung},
};
use gridforge_execution::{
    client::ExecutionClient,
    order::{
        id::{BotId, ClientOrderId},
        request::{OrderRequestCancel, OrderRequestOpen, RequestCancel, RequestOpen},
        OrderKey, OrderKind, TimeInForce,
    },
};
use gridforge_instrument::{instrument::InstrumentNameExchange, Direction, Side};
use gridforge_persistence::{
    cycle_repository::CycleRepository,
    models::{
        bot::BotParams,
        cycle::{Cycle, CycleStatus},
        order::{NewOrder, Order as PersistedOrder, OrderRole, OrderStatus},
    },
    order_repository::{ExecutionReport, OrderRepository},
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

const SAFETY_PLACEMENT_MAX_RETRIES: u8 = 3;
const SAFETY_PLACEMENT_BACKOFF: Duration = Duration::from_secs(2);
const TAKE_PROFIT_PLACEMENT_MAX_RETRIES: u8 = 5;

/// Cycle state machine, mirroring the lifecycle column a [`Cycle`] row's `status` tracks plus the
/// finer-grained in-flight phases the Order Repository alone can't distinguish.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CycleState {
    Starting,
    AwaitingBaseFill,
    Holding,
    Closing,
    Completed,
    Aborted,
    Failed,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CycleState::Completed | CycleState::Aborted | CycleState::Failed
        )
    }
}

/// What happened as a result of feeding one [`CycleEvent`] to the manager - tells the Bot
/// Supervisor whether to keep routing events here, start the next cycle, or fail the bot.
#[derive(Debug)]
pub enum CycleOutcome {
    Continue,
    Completed { realized_profit: Decimal },
    Aborted,
    Failed { reason: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum RungState {
    Virtual,
    Placed(ClientOrderId),
    Filled,
    Skipped,
}

fn direction_sign(direction: Direction) -> Decimal {
    match direction {
        Direction::Long => Decimal::ONE,
        Direction::Short => -Decimal::ONE,
    }
}

/// Owns one bot's active [`Cycle`]: placing the base order, laddering safety orders in as the
/// price moves against the position, re-pricing the take-profit on every fill, and closing the
/// cycle out once it's hit. Generic over the exchange client since
/// [`ExecutionClient`](gridforge_execution::client::ExecutionClient) is not dyn-compatible (its
/// methods return `impl Future`).
pub struct CycleManager<C: ExecutionClient> {
    client: C,
    orders: OrderRepository,
    cycles: CycleRepository,
    instrument: InstrumentNameExchange,
    bot_id: BotId,
    direction: Direction,
    params: BotParams,
    cycle: Cycle,
    state: CycleState,
    ladder: Vec<SafetyRung>,
    rungs: Vec<RungState>,
    take_profit_cid: Option<ClientOrderId>,
    safety_retries: HashMap<u32, u8>,
    take_profit_retries: u8,
}

impl<C: ExecutionClient> CycleManager<C> {
    pub fn new(
        client: C,
        orders: OrderRepository,
        cycles: CycleRepository,
        instrument: InstrumentNameExchange,
        bot_id: BotId,
        direction: Direction,
        params: BotParams,
        cycle: Cycle,
    ) -> Self {
        let ladder = compute_ladder(&params);
        let rung_count = ladder.len();

        Self {
            client,
            orders,
            cycles,
            instrument,
            bot_id,
            direction,
            params,
            cycle,
            state: CycleState::Starting,
            ladder,
            rungs: vec![RungState::Virtual; rung_count],
            take_profit_cid: None,
            safety_retries: HashMap::new(),
            take_profit_retries: 0,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    /// Places the base order. `trigger_price` selects a limit entry; `None` places a market order
    /// sized in quote currency.
    pub async fn start(&mut self, trigger_price: Option<Decimal>) -> Result<(), CoreError> {
        let side = self.direction.opening_side();
        let (kind, price) = match trigger_price {
            Some(price) => (OrderKind::Limit, Some(price)),
            None => (OrderKind::Market, None),
        };

        let result = self
            .place_order(
                OrderRole::Base,
                side,
                kind,
                price,
                self.params.base_order_amount,
            )
            .await;

        match result {
            Ok(_) => {
                self.state = CycleState::AwaitingBaseFill;
                Ok(())
            }
            Err(error) => {
                self.state = CycleState::Failed;
                Err(error)
            }
        }
    }

    /// Feeds one event to the cycle, returning what the Supervisor should do next.
    pub async fn handle_event(&mut self, event: CycleEvent) -> Result<CycleOutcome, CoreError> {
        match event {
            CycleEvent::ExecutionReport(report) => self.handle_execution_report(report).await,
            CycleEvent::PriceUpdate(price) => self.handle_price_update(price).await,
            CycleEvent::StreamGap => self.reconcile().await,
        }
    }

    async fn handle_execution_report(
        &mut self,
        report: ExecutionReportEvent,
    ) -> Result<CycleOutcome, CoreError> {
        let Some(persisted) = self
            .orders
            .find_by_client_order_id(report.client_order_id.0.as_str())
            .await?
        else {
            warn!(cid = %report.client_order_id, "execution report for unknown order");
            return Ok(CycleOutcome::Continue);
        };

        let role = persisted.role;

        let updated = self
            .orders
            .apply_execution_report(ExecutionReport {
                client_order_id: report.client_order_id.0.to_string(),
                exchange_order_id: report.exchange_order_id.map(|id| id.0.to_string()),
                status: report.status,
                filled_price: report.filled_price,
                filled_quantity: report.filled_quantity,
            })
            .await?;

        match (role, updated.status) {
            (OrderRole::Base, OrderStatus::Filled) => self.handle_base_filled(&updated).await,
            (OrderRole::Base, OrderStatus::Rejected | OrderStatus::Failed) => {
                self.state = CycleState::Failed;
                self.cycles
                    .finish(self.cycle.id, CycleStatus::Failed, None)
                    .await?;
                Ok(CycleOutcome::Failed {
                    reason: "base order rejected".into(),
                })
            }
            (OrderRole::Safety, OrderStatus::Filled) => self.handle_safety_filled(&updated).await,
            (OrderRole::Safety, OrderStatus::Rejected | OrderStatus::Failed) => {
                self.handle_safety_rejected(&updated).await
            }
            (OrderRole::TakeProfit, OrderStatus::Filled) => {
                self.handle_take_profit_filled().await
            }
            (OrderRole::TakeProfit, OrderStatus::Rejected | OrderStatus::Failed) => {
                self.handle_take_profit_rejected().await
            }
            _ => Ok(CycleOutcome::Continue),
        }
    }

    async fn handle_base_filled(
        &mut self,
        base: &PersistedOrder,
    ) -> Result<CycleOutcome, CoreError> {
        let fill_price = base.filled_price.unwrap_or(base.intended_price.unwrap_or_default());

        self.cycle = self
            .cycles
            .apply_fill(
                self.cycle.id,
                Some(fill_price),
                base.filled_quantity,
                fill_price * base.filled_quantity,
                fill_price,
            )
            .await?;

        if self.ladder.iter().any(|rung| {
            rung_trigger_price(fill_price, rung, direction_sign(self.direction)) <= Decimal::ZERO
        }) {
            self.state = CycleState::Failed;
            self.cycles
                .finish(self.cycle.id, CycleStatus::Failed, None)
                .await?;
            return Ok(CycleOutcome::Failed {
                reason: "safety ladder produces a non-positive price".into(),
            });
        }

        self.place_take_profit(fill_price).await?;

        let active = self.params.active_safety_orders as usize;
        for index in 0..active.min(self.ladder.len()) {
            self.place_safety_rung(index, fill_price).await?;
        }

        self.state = CycleState::Holding;
        info!(cycle_id = %self.cycle.id, "cycle holding after base fill");
        Ok(CycleOutcome::Continue)
    }

    async fn handle_safety_filled(
        &mut self,
        safety: &PersistedOrder,
    ) -> Result<CycleOutcome, CoreError> {
        if let Some(index) = self
            .rungs
            .iter()
            .position(|rung| matches!(rung, RungState::Placed(cid) if *cid == safety.client_order_id))
        {
            self.rungs[index] = RungState::Filled;
        }

        let fill_price = safety.filled_price.unwrap_or_default();
        let total_quote_invested = self
            .orders
            .filled_quote_total(self.cycle.id, self.direction.opening_side())
            .await?;
        let total_base_quantity = self.cycle.total_base_quantity + safety.filled_quantity;
        let average_entry_price = if total_base_quantity.is_zero() {
            fill_price
        } else {
            total_quote_invested / total_base_quantity
        };

        self.cycle = self
            .cycles
            .apply_fill(
                self.cycle.id,
                None,
                total_base_quantity,
                total_quote_invested,
                average_entry_price,
            )
            .await?;

        self.cancel_take_profit().await?;
        self.place_take_profit(average_entry_price).await?;

        let open_safety = self
            .rungs
            .iter()
            .filter(|rung| matches!(rung, RungState::Placed(_)))
            .count();

        if open_safety < self.params.active_safety_orders as usize {
            if let Some(next_index) = self
                .rungs
                .iter()
                .position(|rung| matches!(rung, RungState::Virtual))
            {
                self.place_safety_rung(next_index, self.cycle.base_fill_price.unwrap_or(fill_price))
                    .await?;
            }
        }

        Ok(CycleOutcome::Continue)
    }

    async fn handle_safety_rejected(
        &mut self,
        safety: &PersistedOrder,
    ) -> Result<CycleOutcome, CoreError> {
        let Some(index) = self
            .rungs
            .iter()
            .position(|rung| matches!(rung, RungState::Placed(cid) if *cid == safety.client_order_id))
        else {
            return Ok(CycleOutcome::Continue);
        };

        let retries = self.safety_retries.entry(index as u32).or_insert(0);
        *retries += 1;

        if *retries >= SAFETY_PLACEMENT_MAX_RETRIES {
            warn!(rung = index, "safety rung exhausted retries, skipping");
            self.rungs[index] = RungState::Skipped;
            return Ok(CycleOutcome::Continue);
        }

        self.rungs[index] = RungState::Virtual;
        sleep(SAFETY_PLACEMENT_BACKOFF).await;

        let base_price = self.cycle.base_fill_price.unwrap_or_default();
        self.place_safety_rung(index, base_price).await?;
        Ok(CycleOutcome::Continue)
    }

    async fn handle_take_profit_rejected(&mut self) -> Result<CycleOutcome, CoreError> {
        self.take_profit_retries += 1;

        if self.take_profit_retries >= TAKE_PROFIT_PLACEMENT_MAX_RETRIES {
            warn!(cycle_id = %self.cycle.id, "take-profit exhausted retries, escalating");
            return Ok(CycleOutcome::Failed {
                reason: "take-profit placement exhausted retries".into(),
            });
        }

        let price = self.cycle.average_entry_price.unwrap_or_default();
        self.place_take_profit(price).await?;
        Ok(CycleOutcome::Continue)
    }

    async fn handle_take_profit_filled(&mut self) -> Result<CycleOutcome, CoreError> {
        self.state = CycleState::Closing;
        self.cancel_open_safety_orders().await?;

        let realized_profit = self.realized_profit().await?;

        self.cycle = self
            .cycles
            .finish(self.cycle.id, CycleStatus::Completed, Some(realized_profit))
            .await?;
        self.state = CycleState::Completed;

        info!(cycle_id = %self.cycle.id, %realized_profit, "cycle completed");
        Ok(CycleOutcome::Completed { realized_profit })
    }

    /// Cancels the take-profit and every open safety order, liquidates any remaining base
    /// quantity, and finishes the cycle - `completed` if the take-profit slipped through and
    /// filled while cancellation was in flight, `aborted` otherwise. Shared by `stop_bot` and
    /// `delete_bot`'s cancel-then-liquidate sequence.
    pub async fn cancel_all_and_finish(&mut self) -> Result<CycleOutcome, CoreError> {
        if self.state.is_terminal() {
            return Ok(match self.state {
                CycleState::Completed => CycleOutcome::Completed {
                    realized_profit: self.cycle.realized_profit.unwrap_or_default(),
                },
                CycleState::Aborted => CycleOutcome::Aborted,
                _ => CycleOutcome::Failed {
                    reason: "cycle already failed".into(),
                },
            });
        }

        self.cancel_take_profit().await?;
        self.cancel_open_safety_orders().await?;

        if self.cycle.total_base_quantity > Decimal::ZERO {
            self.place_order(
                OrderRole::Liquidation,
                self.direction.closing_side(),
                OrderKind::Market,
                None,
                self.cycle.total_base_quantity,
            )
            .await?;
        }

        let take_profit_filled = self
            .orders
            .list_by_cycle(self.cycle.id)
            .await?
            .iter()
            .any(|order| order.role == OrderRole::TakeProfit && order.status == OrderStatus::Filled);

        let realized_profit = self.realized_profit().await?;
        let status = if take_profit_filled {
            CycleStatus::Completed
        } else {
            CycleStatus::Aborted
        };

        self.cycle = self.cycles.finish(self.cycle.id, status, Some(realized_profit)).await?;
        self.state = if take_profit_filled {
            CycleState::Completed
        } else {
            CycleState::Aborted
        };

        Ok(if take_profit_filled {
            CycleOutcome::Completed { realized_profit }
        } else {
            CycleOutcome::Aborted
        })
    }

    async fn handle_price_update(&mut self, price: Decimal) -> Result<CycleOutcome, CoreError> {
        if self.state.is_terminal() {
            return Ok(CycleOutcome::Continue);
        }

        let breached = self
            .params
            .lower_price_limit
            .is_some_and(|limit| price <= limit)
            || self
                .params
                .upper_price_limit
                .is_some_and(|limit| price >= limit);

        if !breached {
            return Ok(CycleOutcome::Continue);
        }

        warn!(cycle_id = %self.cycle.id, %price, "price limit breached, aborting cycle");
        self.cancel_take_profit().await?;
        self.cancel_open_safety_orders().await?;

        if self.cycle.total_base_quantity > Decimal::ZERO {
            self.place_order(
                OrderRole::Liquidation,
                self.direction.closing_side(),
                OrderKind::Market,
                None,
                self.cycle.total_base_quantity,
            )
            .await?;
        }

        let realized_profit = self.realized_profit().await?;

        self.cycle = self
            .cycles
            .finish(self.cycle.id, CycleStatus::Aborted, Some(realized_profit))
            .await?;
        self.state = CycleState::Aborted;

        Ok(CycleOutcome::Aborted)
    }

    /// `total quote received from sells - total quote spent on buys`, summed directly from the
    /// Order Repository's filled rows rather than running totals, so it can't drift from what the
    /// exchange actually reports regardless of which direction the cycle traded.
    async fn realized_profit(&self) -> Result<Decimal, CoreError> {
        let sell_total = self
            .orders
            .filled_quote_total(self.cycle.id, Side::Sell)
            .await?;
        let buy_total = self
            .orders
            .filled_quote_total(self.cycle.id, Side::Buy)
            .await?;
        Ok(sell_total - buy_total)
    }

    /// Re-queries the exchange's open orders for this bot's non-terminal local orders after a
    /// user-stream gap. An order absent from the exchange's response either filled or was
    /// cancelled while disconnected; trade history (keyed by the exchange's own order id, since
    /// that's all a trade ever echoes back) resolves which, and the resulting fill is routed
    /// through [`Self::handle_execution_report`] exactly as a live report would be, so laddering
    /// and take-profit re-pricing stay consistent whether or not the stream was ever interrupted.
    async fn reconcile(&mut self) -> Result<CycleOutcome, CoreError> {
        let local = self.orders.list_non_terminal_by_bot(&self.bot_id).await?;
        let remote = self
            .client
            .fetch_open_orders(std::slice::from_ref(&self.instrument))
            .await?;

        let remote_by_cid: HashMap<&str, &gridforge_execution::order::Order<gridforge_execution::order::state::Open>> =
            remote.iter().map(|order| (order.key.cid.0.as_str(), order)).collect();

        let mut missing = Vec::new();

        for order in local {
            match remote_by_cid.get(order.client_order_id.0.as_str()) {
                Some(remote_order) => {
                    let status = if remote_order.state.is_fully_filled() {
                        OrderStatus::Filled
                    } else if remote_order.state.filled_quantity.is_zero() {
                        OrderStatus::Open
                    } else {
                        OrderStatus::PartiallyFilled
                    };

                    self.orders
                        .apply_execution_report(ExecutionReport {
                            client_order_id: order.client_order_id.0.to_string(),
                            exchange_order_id: Some(remote_order.state.id.0.to_string()),
                            status,
                            filled_price: Some(remote_order.state.price),
                            filled_quantity: remote_order.state.filled_quantity,
                        })
                        .await?;
                }
                None => missing.push(order),
            }
        }

        if missing.is_empty() {
            return Ok(CycleOutcome::Continue);
        }

        let since = missing
            .iter()
            .map(|order| order.created_at)
            .min()
            .unwrap_or(self.cycle.started_at);

        let trades = self
            .client
            .fetch_trades(std::slice::from_ref(&self.instrument), since)
            .await?;

        let mut trades_by_exchange_order_id: HashMap<&str, Vec<&gridforge_execution::trade::Trade>> =
            HashMap::new();
        for trade in &trades {
            trades_by_exchange_order_id
                .entry(trade.order_id.0.as_str())
                .or_default()
                .push(trade);
        }

        let mut outcome = CycleOutcome::Continue;

        for order in missing {
            let Some(exchange_order_id) = order.exchange_order_id.as_ref() else {
                tracing::error!(
                    order_id = %order.id,
                    client_order_id = %order.client_order_id,
                    "order missing from exchange with no exchange order id on record - ambiguous, alerting"
                );
                continue;
            };

            let Some(matched) = trades_by_exchange_order_id.get(exchange_order_id.0.as_str())
            else {
                tracing::error!(
                    order_id = %order.id,
                    client_order_id = %order.client_order_id,
                    "order missing from exchange and absent from trade history - ambiguous, alerting"
                );
                continue;
            };

            let filled_quantity: Decimal = matched.iter().map(|trade| trade.quantity).sum();
            let quote_total: Decimal = matched.iter().map(|trade| trade.value_quote()).sum();
            let filled_price = if filled_quantity.is_zero() {
                order.intended_price.unwrap_or_default()
            } else {
                quote_total / filled_quantity
            };
            let status = if filled_quantity >= order.intended_quantity {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            let event_time = matched
                .iter()
                .map(|trade| trade.time_exchange)
                .max()
                .unwrap_or_else(chrono::Utc::now);

            info!(
                order_id = %order.id,
                client_order_id = %order.client_order_id,
                %filled_quantity,
                "recovered gap fill from trade history"
            );

            outcome = self
                .handle_execution_report(ExecutionReportEvent {
                    bot: self.bot_id.clone(),
                    client_order_id: order.client_order_id.clone(),
                    exchange_order_id: Some(exchange_order_id.clone()),
                    status,
                    filled_price: Some(filled_price),
                    filled_quantity,
                    event_time,
                })
                .await?;
        }

        Ok(outcome)
    }

    async fn place_safety_rung(
        &mut self,
        index: usize,
        base_price: Decimal,
    ) -> Result<(), CoreError> {
        let rung = self.ladder[index];
        let price = rung_trigger_price(base_price, &rung, direction_sign(self.direction));
        let quote_amount = rung_order_amount(&self.params, &rung);
        let quantity = if price.is_zero() {
            Decimal::ZERO
        } else {
            quote_amount / price
        };

        let persisted = self
            .place_order(
                OrderRole::Safety,
                self.direction.opening_side(),
                OrderKind::Limit,
                Some(price),
                quantity,
            )
            .await?;

        self.rungs[index] = RungState::Placed(persisted.client_order_id);
        Ok(())
    }

    async fn place_take_profit(&mut self, average_entry_price: Decimal) -> Result<(), CoreError> {
        let price = take_profit_price(
            average_entry_price,
            self.params.take_profit_pct,
            direction_sign(self.direction),
        );

        let persisted = self
            .place_order(
                OrderRole::TakeProfit,
                self.direction.closing_side(),
                OrderKind::Limit,
                Some(price),
                self.cycle.total_base_quantity,
            )
            .await?;

        self.take_profit_cid = Some(persisted.client_order_id);
        self.take_profit_retries = 0;
        Ok(())
    }

    async fn cancel_take_profit(&mut self) -> Result<(), CoreError> {
        let Some(cid) = self.take_profit_cid.take() else {
            return Ok(());
        };
        self.cancel_by_client_order_id(&cid).await
    }

    async fn cancel_open_safety_orders(&mut self) -> Result<(), CoreError> {
        let placed: Vec<ClientOrderId> = self
            .rungs
            .iter()
            .filter_map(|rung| match rung {
                RungState::Placed(cid) => Some(cid.clone()),
                _ => None,
            })
            .collect();

        for cid in placed {
            self.cancel_by_client_order_id(&cid).await?;
        }
        Ok(())
    }

    async fn cancel_by_client_order_id(&self, cid: &ClientOrderId) -> Result<(), CoreError> {
        let Some(order) = self.orders.find_by_client_order_id(cid.0.as_str()).await? else {
            return Ok(());
        };
        if order.status.is_terminal() {
            return Ok(());
        }

        let request = OrderRequestCancel::new(
            OrderKey::new(self.instrument.clone(), self.bot_id.clone(), cid.clone()),
            RequestCancel::new(order.exchange_order_id.clone()),
        );

        let response = self.client.cancel_order(request).await;
        match response.state {
            Ok(_) => {
                self.orders.mark_cancelled(order.id).await?;
            }
            Err(error) => {
                warn!(%cid, %error, "cancel request failed");
            }
        }
        Ok(())
    }

    async fn place_order(
        &self,
        role: OrderRole,
        side: Side,
        kind: OrderKind,
        price: Option<Decimal>,
        quantity: Decimal,
    ) -> Result<PersistedOrder, CoreError> {
        let cid = ClientOrderId::random();

        let reserved = self
            .orders
            .reserve(NewOrder::new(
                self.cycle.id,
                self.bot_id.clone(),
                role,
                side,
                kind,
                price,
                quantity,
                cid.clone(),
            ))
            .await?;

        let time_in_force = match kind {
            OrderKind::Market => TimeInForce::ImmediateOrCancel,
            OrderKind::Limit => TimeInForce::GoodUntilCancelled { post_only: false },
        };

        let request = OrderRequestOpen::new(
            OrderKey::new(self.instrument.clone(), self.bot_id.clone(), cid.clone()),
            RequestOpen::new(side, price.unwrap_or_default(), quantity, kind, time_in_force),
        );

        let response = self.client.open_order(request).await;

        match response.state {
            Ok(open) => {
                self.orders
                    .mark_submitted(cid.0.as_str(), &open.id)
                    .await?;
                Ok(reserved)
            }
            Err(error) => {
                self.orders
                    .mark_failed(reserved.id, &error.to_string())
                    .await?;
                Err(CoreError::Client(match error {
                    gridforge_execution::error::OrderError::Api(api) => {
                        gridforge_execution::error::ClientError::Api(api)
                    }
                    gridforge_execution::error::OrderError::Connectivity(c) => {
                        gridforge_execution::error::ClientError::Connectivity(c)
                    }
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_execution::client::mock::MockExecutionClient;
    use gridforge_persistence::{
        bot_repository::BotRepository,
        models::{bot::TakeProfitMode, cycle::NewCycle},
    };
    use rust_decimal_macros::dec;
    use sqlx::PgPool;

    fn params() -> BotParams {
        BotParams {
            base_order_amount: dec!(0.002),
            safety_order_amount: dec!(99.99),
            max_safety_orders: 1,
            active_safety_orders: 1,
            price_deviation_pct: dec!(1),
            price_deviation_multiplier: dec!(1),
            safety_order_size_multiplier: dec!(1),
            take_profit_pct: dec!(1),
            take_profit_mode: TakeProfitMode::Fixed,
            trailing_pct: None,
            cooldown_between_rounds_seconds: 60,
            lower_price_limit: None,
            upper_price_limit: None,
        }
    }

    async fn seeded_manager(pool: PgPool) -> CycleManager<MockExecutionClient> {
        let bots = BotRepository::new(pool.clone());
        let orders = OrderRepository::new(pool.clone());
        let cycles = CycleRepository::new(pool.clone());

        let bot = bots
            .create_bot("user-1", "acct-1", "bot-a", "BTCUSDT", Direction::Long, &params())
            .await
            .unwrap();
        let cycle = cycles
            .start_cycle(NewCycle::new(bot.id.clone(), 1))
            .await
            .unwrap();

        CycleManager::new(
            MockExecutionClient::new(),
            orders,
            cycles,
            InstrumentNameExchange::new("BTCUSDT"),
            bot.id,
            Direction::Long,
            params(),
            cycle,
        )
    }

    fn report_for(
        order: &PersistedOrder,
        filled_price: Decimal,
        filled_quantity: Decimal,
    ) -> ExecutionReportEvent {
        ExecutionReportEvent {
            bot: order.bot_id.clone(),
            client_order_id: order.client_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            status: OrderStatus::Filled,
            filled_price: Some(filled_price),
            filled_quantity,
            event_time: chrono::Utc::now(),
        }
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn base_fill_places_safety_and_take_profit(pool: PgPool) {
        let mut manager = seeded_manager(pool.clone()).await;
        manager.start(None).await.unwrap();
        assert_eq!(manager.state(), CycleState::AwaitingBaseFill);

        let orders = OrderRepository::new(pool.clone());
        let base_order = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Base)
            .unwrap();

        let outcome = manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &base_order,
                dec!(50000),
                dec!(0.002),
            )))
            .await
            .unwrap();

        assert!(matches!(outcome, CycleOutcome::Continue));
        assert_eq!(manager.state(), CycleState::Holding);

        let placed = orders.list_by_cycle(manager.cycle().id).await.unwrap();
        assert!(placed
            .iter()
            .any(|order| order.role == OrderRole::Safety && order.status == OrderStatus::Open));
        assert!(placed
            .iter()
            .any(|order| order.role == OrderRole::TakeProfit && order.status == OrderStatus::Open));
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn safety_fill_reprices_take_profit_and_completes_on_fill(pool: PgPool) {
        let mut manager = seeded_manager(pool.clone()).await;
        manager.start(None).await.unwrap();

        let orders = OrderRepository::new(pool.clone());
        let base_order = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Base)
            .unwrap();
        manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &base_order,
                dec!(50000),
                dec!(0.002),
            )))
            .await
            .unwrap();

        let original_tp = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::TakeProfit)
            .unwrap();
        let safety_order = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Safety)
            .unwrap();

        manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &safety_order,
                dec!(49500),
                dec!(0.00202),
            )))
            .await
            .unwrap();

        assert_eq!(manager.cycle().total_base_quantity, dec!(0.00402));

        let after_safety = orders.list_by_cycle(manager.cycle().id).await.unwrap();
        let cancelled_original_tp = after_safety
            .iter()
            .find(|order| order.id == original_tp.id)
            .unwrap();
        assert_eq!(cancelled_original_tp.status, OrderStatus::Cancelled);

        let new_tp = after_safety
            .iter()
            .find(|order| order.role == OrderRole::TakeProfit && order.status == OrderStatus::Open)
            .unwrap()
            .clone();

        let outcome = manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &new_tp,
                new_tp.intended_price.unwrap(),
                manager.cycle().total_base_quantity,
            )))
            .await
            .unwrap();

        match outcome {
            CycleOutcome::Completed { realized_profit } => assert!(realized_profit > Decimal::ZERO),
            other => panic!("expected cycle to complete, got {other:?}"),
        }
        assert_eq!(manager.state(), CycleState::Completed);
        assert_eq!(manager.cycle().total_base_quantity, Decimal::ZERO);
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn safety_rejection_retries_then_skips_after_max_attempts(pool: PgPool) {
        let mut manager = seeded_manager(pool.clone()).await;
        manager.start(None).await.unwrap();

        let orders = OrderRepository::new(pool.clone());
        let base_order = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Base)
            .unwrap();
        manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &base_order,
                dec!(50000),
                dec!(0.002),
            )))
            .await
            .unwrap();

        for _ in 0..SAFETY_PLACEMENT_MAX_RETRIES {
            let safety_order = orders
                .list_by_cycle(manager.cycle().id)
                .await
                .unwrap()
                .into_iter()
                .find(|order| order.role == OrderRole::Safety && order.status == OrderStatus::Open)
                .unwrap();

            manager
                .handle_event(CycleEvent::ExecutionReport(ExecutionReportEvent {
                    bot: safety_order.bot_id.clone(),
                    client_order_id: safety_order.client_order_id.clone(),
                    exchange_order_id: safety_order.exchange_order_id.clone(),
                    status: OrderStatus::Rejected,
                    filled_price: None,
                    filled_quantity: Decimal::ZERO,
                    event_time: chrono::Utc::now(),
                }))
                .await
                .unwrap();
        }

        let safety_orders = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .filter(|order| order.role == OrderRole::Safety)
            .count();
        assert_eq!(safety_orders, SAFETY_PLACEMENT_MAX_RETRIES as usize);
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn stop_with_open_position_liquidates_and_aborts(pool: PgPool) {
        let mut manager = seeded_manager(pool.clone()).await;
        manager.start(None).await.unwrap();

        let orders = OrderRepository::new(pool.clone());
        let base_order = orders
            .list_by_cycle(manager.cycle().id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Base)
            .unwrap();
        manager
            .handle_event(CycleEvent::ExecutionReport(report_for(
                &base_order,
                dec!(50000),
                dec!(0.002),
            )))
            .await
            .unwrap();

        let outcome = manager.cancel_all_and_finish().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Aborted));
        assert_eq!(manager.state(), CycleState::Aborted);

        let final_orders = orders.list_by_cycle(manager.cycle().id).await.unwrap();
        assert!(final_orders.iter().any(|order| order.role == OrderRole::Liquidation));
        assert!(final_orders
            .iter()
            .filter(|order| order.role == OrderRole::Safety || order.role == OrderRole::TakeProfit)
            .all(|order| order.status == OrderStatus::Cancelled));
    }
}
