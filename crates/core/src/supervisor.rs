use crate::{
    cycle::{CycleManager, CycleOutcome},
    error::CoreError,
    event::CycleEvent,
    validation::validate_params,
};
use futures::StreamExt;
use gridforge_execution::{
    client::ExecutionClient,
    error::ClientError,
    order::{
        id::{BotId, ClientOrderId},
        request::{OrderRequestCancel, OrderRequestOpen, RequestCancel, RequestOpen},
        state::{ActiveOrderState, Cancelled, InactiveOrderState, Open, OrderState},
        Order as WireOrder, OrderKey, OrderKind, TimeInForce,
    },
    trade::Trade,
    AccountEventKind,
};
use gridforge_instrument::{asset::AssetNameExchange, instrument::InstrumentNameExchange, Direction, Side};
use gridforge_persistence::{
    bot_repository::BotRepository,
    cycle_repository::CycleRepository,
    models::{
        bot::{Bot, BotDataAction, BotParams, BotStatus},
        cycle::{Cycle, CycleStatus, NewCycle},
        order::{NewOrder, OrderRole, OrderStatus},
    },
    order_repository::OrderRepository,
};
use rust_decimal::Decimal;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// Published whenever a bot's status or active cycle changes, for the Event Hub to fan out to
/// subscribed clients.
#[derive(Debug, Clone)]
pub enum BotNotification {
    StatusUpdate {
        bot_id: BotId,
        status: BotStatus,
        message: Option<String>,
    },
    CycleUpdate {
        bot_id: BotId,
        cycle: Cycle,
    },
    OrderUpdate {
        bot_id: BotId,
        client_order_id: ClientOrderId,
        status: OrderStatus,
        filled_price: Option<Decimal>,
        filled_quantity: Decimal,
    },
    DataUpdate {
        bot_id: BotId,
        action: BotDataAction,
        bot: Bot,
    },
}

/// Per-bot storage: the live [`CycleManager`] driving its active cycle, if any. Guarded by the
/// same mutex the Bot Supervisor uses to serialise lifecycle operations on this bot, so the
/// lock doubles as both the serialisation point and the place the manager lives.
struct BotSlot<C: ExecutionClient> {
    cycle: Option<CycleManager<C>>,
}

/// Creates, starts, stops and deletes bots, and routes execution reports from the Exchange
/// Gateway's account stream to the right bot's [`CycleManager`]. Generic over the exchange
/// client for the same reason [`CycleManager`] is: [`ExecutionClient`] isn't dyn-compatible.
///
/// Each bot has its own `tokio::sync::Mutex`, taken for the whole of a `start`/`stop`/`delete`
/// sequence so that, e.g., a concurrent stop and delete on the same bot never race on the same
/// orders. Operations on different bots proceed independently.
pub struct BotSupervisor<C: ExecutionClient> {
    client: C,
    bots: BotRepository,
    orders: OrderRepository,
    cycles: CycleRepository,
    slots: Mutex<HashMap<BotId, Arc<Mutex<BotSlot<C>>>>>,
    notifications: broadcast::Sender<BotNotification>,
}

impl<C> BotSupervisor<C>
where
    C: ExecutionClient + Send + Sync + 'static,
    C::AccountStream: Send,
{
    pub fn new(
        client: C,
        bots: BotRepository,
        orders: OrderRepository,
        cycles: CycleRepository,
    ) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        Arc::new(Self {
            client,
            bots,
            orders,
            cycles,
            slots: Mutex::new(HashMap::new()),
            notifications,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotNotification> {
        self.notifications.subscribe()
    }

    fn notify(&self, notification: BotNotification) {
        // No subscribers yet (eg/ the Event Hub hasn't connected) is not an error.
        let _ = self.notifications.send(notification);
    }

    async fn slot(&self, bot_id: &BotId) -> Arc<Mutex<BotSlot<C>>> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(bot_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(BotSlot { cycle: None })))
            .clone()
    }

    /// Validates and persists a new bot in `pending` status. Does not place any order.
    pub async fn create_bot(
        &self,
        user_id: &str,
        exchange_account_id: &str,
        name: &str,
        symbol: &str,
        direction: Direction,
        params: BotParams,
    ) -> Result<Bot, CoreError> {
        validate_params(&params)?;
        let bot = self
            .bots
            .create_bot(user_id, exchange_account_id, name, symbol, direction, &params)
            .await?;

        self.notify(BotNotification::DataUpdate {
            bot_id: bot.id.clone(),
            action: BotDataAction::Created,
            bot: bot.clone(),
        });

        Ok(bot)
    }

    /// Starts a `pending`/`inactive`/`failed` bot: validates its ladder, opens cycle #1, and
    /// places the base order. On any failure the bot is marked `failed` with the error recorded.
    pub async fn start_bot(&self, bot_id: &BotId) -> Result<(), CoreError> {
        let slot = self.slot(bot_id).await;
        let mut guard = slot.lock().await;

        let bot = self.bots.find(bot_id).await?;
        if bot.status == BotStatus::Active {
            return Err(CoreError::CycleAlreadyActive(bot_id.clone()));
        }

        if let Err(error) = self.begin_cycle(bot_id, &bot, &mut guard).await {
            warn!(%bot_id, %error, "start_bot failed");
            self.bots
                .set_status(bot_id, BotStatus::Failed, Some(&error.to_string()))
                .await?;
            self.notify(BotNotification::StatusUpdate {
                bot_id: bot_id.clone(),
                status: BotStatus::Failed,
                message: Some(error.to_string()),
            });
            return Err(error);
        }

        let bot = self.bots.find(bot_id).await?;
        self.notify(BotNotification::DataUpdate {
            bot_id: bot_id.clone(),
            action: BotDataAction::Updated,
            bot,
        });

        Ok(())
    }

    /// Opens a fresh cycle for `bot` and places its base order. Caller must already hold `bot`'s
    /// slot lock. Used both by `start_bot` and by the cooldown-expiry restart after a cycle
    /// completes.
    async fn begin_cycle(
        &self,
        bot_id: &BotId,
        bot: &Bot,
        guard: &mut BotSlot<C>,
    ) -> Result<(), CoreError> {
        // `ExecutionClient` doesn't expose a way to fetch a symbol's filters (quantization happens
        // privately inside `open_order`), so this only checks the ladder's arithmetic validity;
        // true filter compliance is only discoverable at placement time, surfacing as a
        // `FilterViolation` retry/skip.
        validate_params(&bot.params)?;

        if self.cycles.find_active_for_bot(bot_id).await?.is_some() {
            return Err(CoreError::CycleAlreadyActive(bot_id.clone()));
        }

        let cycle_number = self.cycles.list_by_bot(bot_id).await?.len() as i32 + 1;
        let cycle = self
            .cycles
            .start_cycle(NewCycle::new(bot_id.clone(), cycle_number))
            .await?;

        let instrument = InstrumentNameExchange::new(bot.symbol.clone());
        let mut manager = CycleManager::new(
            self.client.clone(),
            self.orders.clone(),
            self.cycles.clone(),
            instrument,
            bot_id.clone(),
            bot.direction,
            bot.params.clone(),
            cycle,
        );

        manager.start(None).await?;
        self.notify(BotNotification::CycleUpdate {
            bot_id: bot_id.clone(),
            cycle: manager.cycle().clone(),
        });
        guard.cycle = Some(manager);

        self.bots.set_status(bot_id, BotStatus::Active, None).await?;
        self.notify(BotNotification::StatusUpdate {
            bot_id: bot_id.clone(),
            status: BotStatus::Active,
            message: None,
        });

        Ok(())
    }

    /// Cancels every non-terminal order for the bot, liquidates any remaining base quantity, and
    /// marks its active cycle `aborted` (or `completed` if the take-profit slipped through while
    /// cancellation was in flight). Individual cancel failures are logged and accumulated rather
    /// than aborting the whole sequence.
    async fn cancel_and_liquidate(&self, bot_id: &BotId, guard: &mut BotSlot<C>) -> Result<(), CoreError> {
        let bot = self.bots.find(bot_id).await?;
        let instrument = InstrumentNameExchange::new(bot.symbol.clone());

        let non_terminal = self.orders.list_non_terminal_by_bot(bot_id).await?;
        let mut cancel_failures = Vec::new();

        for order in &non_terminal {
            let request = OrderRequestCancel::new(
                OrderKey::new(instrument.clone(), bot_id.clone(), order.client_order_id.clone()),
                RequestCancel::new(order.exchange_order_id.clone()),
            );

            match self.client.cancel_order(request).await.state {
                Ok(_) => {
                    self.orders.mark_cancelled(order.id).await?;
                }
                Err(error) => {
                    cancel_failures.push(format!("{}: {error}", order.client_order_id));
                }
            }
        }

        if !cancel_failures.is_empty() {
            warn!(%bot_id, failures = ?cancel_failures, "some orders could not be cancelled during stop/delete");
        }

        if let Some(manager) = guard.cycle.as_mut() {
            manager.cancel_all_and_finish().await?;
            guard.cycle = None;
            return Ok(());
        }

        // No live manager for this bot (eg/ the process restarted and this bot wasn't resumed) -
        // fall back to liquidating the persisted active cycle directly, if one exists.
        let Some(cycle) = self.cycles.find_active_for_bot(bot_id).await? else {
            return Ok(());
        };

        if cycle.total_base_quantity > Decimal::ZERO {
            let cid = ClientOrderId::random();
            let reserved = self
                .orders
                .reserve(NewOrder::new(
                    cycle.id,
                    bot_id.clone(),
                    OrderRole::Liquidation,
                    bot.direction.closing_side(),
                    OrderKind::Market,
                    None,
                    cycle.total_base_quantity,
                    cid.clone(),
                ))
                .await?;

            let request = OrderRequestOpen::new(
                OrderKey::new(instrument, bot_id.clone(), cid.clone()),
                RequestOpen::new(
                    bot.direction.closing_side(),
                    Decimal::ZERO,
                    cycle.total_base_quantity,
                    OrderKind::Market,
                    TimeInForce::ImmediateOrCancel,
                ),
            );

            match self.client.open_order(request).await.state {
                Ok(open) => {
                    self.orders.mark_submitted(cid.0.as_str(), &open.id).await?;
                }
                Err(error) => {
                    self.orders.mark_failed(reserved.id, &error.to_string()).await?;
                    warn!(%bot_id, %error, "liquidation order failed during stop/delete");
                }
            }
        }

        let sell_total = self.orders.filled_quote_total(cycle.id, Side::Sell).await?;
        let buy_total = self.orders.filled_quote_total(cycle.id, Side::Buy).await?;
        let realized_profit = sell_total - buy_total;

        self.cycles
            .finish(cycle.id, CycleStatus::Aborted, Some(realized_profit))
            .await?;

        Ok(())
    }

    /// Cancels every open order, liquidates any open position, marks the active cycle finished,
    /// and marks the bot `inactive`.
    pub async fn stop_bot(&self, bot_id: &BotId) -> Result<(), CoreError> {
        let slot = self.slot(bot_id).await;
        let mut guard = slot.lock().await;

        self.cancel_and_liquidate(bot_id, &mut guard).await?;
        self.bots.set_status(bot_id, BotStatus::Inactive, None).await?;

        self.notify(BotNotification::StatusUpdate {
            bot_id: bot_id.clone(),
            status: BotStatus::Inactive,
            message: None,
        });

        let bot = self.bots.find(bot_id).await?;
        self.notify(BotNotification::DataUpdate {
            bot_id: bot_id.clone(),
            action: BotDataAction::Stopped,
            bot,
        });

        Ok(())
    }

    /// Same cancel-then-liquidate sequence as `stop_bot`, then archives the bot's orders and
    /// deletes the bot row (cascading to its cycles).
    pub async fn delete_bot(&self, bot_id: &BotId) -> Result<(), CoreError> {
        let slot = self.slot(bot_id).await;
        let mut guard = slot.lock().await;

        let bot = self.bots.find(bot_id).await?;

        self.cancel_and_liquidate(bot_id, &mut guard).await?;
        self.orders.archive_bot_orders(bot_id).await?;
        self.bots.delete(bot_id).await?;
        drop(guard);

        self.slots.lock().await.remove(bot_id);
        self.notify(BotNotification::StatusUpdate {
            bot_id: bot_id.clone(),
            status: BotStatus::Inactive,
            message: Some("deleted".into()),
        });
        self.notify(BotNotification::DataUpdate {
            bot_id: bot_id.clone(),
            action: BotDataAction::Deleted,
            bot,
        });

        Ok(())
    }

    /// Rehydrates every `active` bot after a process restart: reattaches a fresh
    /// [`CycleManager`] to its persisted active cycle (if any) and triggers a reconciliation
    /// pass against the exchange's open orders. A bot with no persisted active cycle (crashed
    /// between cycles) gets a new one started instead.
    ///
    /// The safety ladder's in-memory rung bookkeeping isn't persisted, so a resumed manager
    /// starts believing every rung is unplaced; the next fill after resume may therefore place
    /// one rung more than `active_safety_orders` calls for before the count self-corrects. See
    /// `DESIGN.md`.
    pub async fn resume_active_bots(self: &Arc<Self>) -> Result<(), CoreError> {
        for bot in self.bots.list_active().await? {
            if let Err(error) = self.resume_bot(&bot).await {
                warn!(bot_id = %bot.id, %error, "failed to resume bot after restart");
                self.bots
                    .set_status(&bot.id, BotStatus::Failed, Some(&error.to_string()))
                    .await
                    .ok();
            }
        }
        Ok(())
    }

    async fn resume_bot(self: &Arc<Self>, bot: &Bot) -> Result<(), CoreError> {
        let slot = self.slot(&bot.id).await;
        let mut guard = slot.lock().await;

        let Some(cycle) = self.cycles.find_active_for_bot(&bot.id).await? else {
            return self.begin_cycle(&bot.id, bot, &mut guard).await;
        };

        let instrument = InstrumentNameExchange::new(bot.symbol.clone());
        let manager = CycleManager::new(
            self.client.clone(),
            self.orders.clone(),
            self.cycles.clone(),
            instrument,
            bot.id.clone(),
            bot.direction,
            bot.params.clone(),
            cycle,
        );

        guard.cycle = Some(manager);
        drop(guard);

        self.dispatch_to_bot(bot.id.clone(), CycleEvent::StreamGap).await;
        Ok(())
    }

    /// Consumes the exchange's account stream until it ends, translating and routing each event
    /// to the bot it belongs to.
    pub async fn run(
        self: &Arc<Self>,
        assets: &[AssetNameExchange],
        instruments: &[InstrumentNameExchange],
    ) -> Result<(), CoreError> {
        let stream = self.client.account_stream(assets, instruments).await?;
        tokio::pin!(stream);

        while let Some(event) = stream.next().await {
            self.dispatch_account_event(event.kind).await;
        }

        Ok(())
    }

    async fn dispatch_account_event(self: &Arc<Self>, kind: AccountEventKind) {
        match kind {
            AccountEventKind::Snapshot(_) => {
                // The account snapshot at stream start (or after a reconnect) is exactly a stream
                // gap for every bot we're currently tracking - let reconcile() re-derive order
                // status from fetch_open_orders rather than duplicating that logic here.
                let bot_ids: Vec<BotId> = {
                    let slots = self.slots.lock().await;
                    slots.keys().cloned().collect()
                };
                for bot_id in bot_ids {
                    self.dispatch_to_bot(bot_id, CycleEvent::StreamGap).await;
                }
            }
            AccountEventKind::BalanceSnapshot(_) => {
                // Balance reporting is the Event Hub's concern, not the trading core's.
            }
            AccountEventKind::OrderSnapshot(order) => {
                if let Some((bot_id, event)) = self.translate_order_snapshot(order).await {
                    self.dispatch_to_bot(bot_id, event).await;
                }
            }
            AccountEventKind::OrderOpened(order) => {
                if let Some((bot_id, event)) = self.translate_opened(order).await {
                    self.dispatch_to_bot(bot_id, event).await;
                }
            }
            AccountEventKind::OrderCancelled(order) => {
                if let Some((bot_id, event)) = self.translate_cancelled(order).await {
                    self.dispatch_to_bot(bot_id, event).await;
                }
            }
            AccountEventKind::Trade(trade) => {
                if let Some((bot_id, event)) = self.translate_trade(trade).await {
                    self.dispatch_to_bot(bot_id, event).await;
                }
            }
        }
    }

    async fn dispatch_to_bot(self: &Arc<Self>, bot_id: BotId, event: CycleEvent) {
        if let CycleEvent::ExecutionReport(report) = &event {
            self.notify(BotNotification::OrderUpdate {
                bot_id: bot_id.clone(),
                client_order_id: report.client_order_id.clone(),
                status: report.status,
                filled_price: report.filled_price,
                filled_quantity: report.filled_quantity,
            });
        }

        let slot = self.slot(&bot_id).await;

        let outcome = {
            let mut guard = slot.lock().await;
            let Some(manager) = guard.cycle.as_mut() else {
                warn!(%bot_id, "execution report for bot with no active cycle, dropping");
                return;
            };

            let outcome = match manager.handle_event(event).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(%bot_id, %error, "cycle event handling failed");
                    return;
                }
            };

            self.notify(BotNotification::CycleUpdate {
                bot_id: bot_id.clone(),
                cycle: manager.cycle().clone(),
            });

            if manager.state().is_terminal() {
                guard.cycle = None;
            }

            outcome
        };

        self.handle_cycle_outcome(bot_id, outcome).await;
    }

    async fn handle_cycle_outcome(self: &Arc<Self>, bot_id: BotId, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Continue => {}
            CycleOutcome::Completed { realized_profit } => {
                info!(%bot_id, %realized_profit, "cycle completed");

                if let Ok(bot) = self.bots.find(&bot_id).await {
                    let cooldown = bot.params.cooldown_between_rounds_seconds;
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        this.restart_after_cooldown(bot_id, cooldown).await;
                    });
                }
            }
            CycleOutcome::Aborted => {
                warn!(%bot_id, "cycle aborted");
                if let Err(error) = self.bots.set_status(&bot_id, BotStatus::Inactive, None).await {
                    warn!(%bot_id, %error, "failed to mark bot inactive after abort");
                }
                self.notify(BotNotification::StatusUpdate {
                    bot_id,
                    status: BotStatus::Inactive,
                    message: None,
                });
            }
            CycleOutcome::Failed { reason } => {
                warn!(%bot_id, reason, "cycle failed");
                if let Err(error) = self
                    .bots
                    .set_status(&bot_id, BotStatus::Failed, Some(&reason))
                    .await
                {
                    warn!(%bot_id, %error, "failed to mark bot failed");
                }
                self.notify(BotNotification::StatusUpdate {
                    bot_id,
                    status: BotStatus::Failed,
                    message: Some(reason),
                });
            }
        }
    }

    async fn restart_after_cooldown(self: Arc<Self>, bot_id: BotId, cooldown_secs: u64) {
        sleep(Duration::from_secs(cooldown_secs)).await;

        let slot = self.slot(&bot_id).await;
        let mut guard = slot.lock().await;

        let Ok(bot) = self.bots.find(&bot_id).await else {
            return;
        };
        if bot.status != BotStatus::Active || guard.cycle.is_some() {
            return;
        }

        if let Err(error) = self.begin_cycle(&bot_id, &bot, &mut guard).await {
            warn!(%bot_id, %error, "failed to start next cycle after cooldown");
            drop(guard);
            self.bots
                .set_status(&bot_id, BotStatus::Failed, Some(&error.to_string()))
                .await
                .ok();
        }
    }

    async fn translate_opened(
        &self,
        order: WireOrder<Result<Open, ClientError>>,
    ) -> Option<(BotId, CycleEvent)> {
        let cid = order.key.cid.clone();
        let persisted = match self.orders.find_by_client_order_id(cid.0.as_str()).await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                warn!(%cid, "order_opened for unknown client_order_id");
                return None;
            }
            Err(error) => {
                warn!(%error, "order repository lookup failed for order_opened");
                return None;
            }
        };

        let (status, filled_price, filled_quantity, exchange_order_id, event_time) = match order.state {
            Ok(open) => {
                let status = if open.is_fully_filled() {
                    OrderStatus::Filled
                } else if open.filled_quantity.is_zero() {
                    OrderStatus::Open
                } else {
                    OrderStatus::PartiallyFilled
                };
                (status, Some(open.price), open.filled_quantity, Some(open.id), open.time_exchange)
            }
            Err(error) => {
                warn!(%error, %cid, "order open rejected by exchange");
                (OrderStatus::Rejected, None, Decimal::ZERO, None, chrono::Utc::now())
            }
        };

        Some((
            persisted.bot_id.clone(),
            CycleEvent::ExecutionReport(crate::event::ExecutionReportEvent {
                bot: persisted.bot_id,
                client_order_id: persisted.client_order_id,
                exchange_order_id,
                status,
                filled_price,
                filled_quantity,
                event_time,
            }),
        ))
    }

    async fn translate_cancelled(
        &self,
        order: WireOrder<Result<Cancelled, ClientError>>,
    ) -> Option<(BotId, CycleEvent)> {
        let cid = order.key.cid.clone();
        let persisted = match self.orders.find_by_client_order_id(cid.0.as_str()).await {
            Ok(Some(persisted)) => persisted,
            _ => return None,
        };

        match order.state {
            Ok(cancelled) => Some((
                persisted.bot_id.clone(),
                CycleEvent::ExecutionReport(crate::event::ExecutionReportEvent {
                    bot: persisted.bot_id,
                    client_order_id: persisted.client_order_id,
                    exchange_order_id: Some(cancelled.id),
                    status: OrderStatus::Cancelled,
                    filled_price: persisted.filled_price,
                    filled_quantity: persisted.filled_quantity,
                    event_time: cancelled.time_exchange,
                }),
            )),
            Err(error) => {
                warn!(%error, %cid, "cancel rejected by exchange");
                None
            }
        }
    }

    async fn translate_trade(&self, trade: Trade) -> Option<(BotId, CycleEvent)> {
        let persisted = match self
            .orders
            .find_by_exchange_order_id(trade.order_id.0.as_str())
            .await
        {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                warn!(order_id = %trade.order_id, "trade for unmatched order, dropping");
                return None;
            }
            Err(error) => {
                warn!(%error, "order repository lookup failed for trade");
                return None;
            }
        };

        let filled_quantity = persisted.filled_quantity + trade.quantity.abs();
        let status = if filled_quantity >= persisted.intended_quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        Some((
            persisted.bot_id.clone(),
            CycleEvent::ExecutionReport(crate::event::ExecutionReportEvent {
                bot: persisted.bot_id,
                client_order_id: persisted.client_order_id,
                exchange_order_id: Some(trade.order_id),
                status,
                filled_price: Some(trade.price),
                filled_quantity,
                event_time: trade.time_exchange,
            }),
        ))
    }

    async fn translate_order_snapshot(&self, order: WireOrder<OrderState>) -> Option<(BotId, CycleEvent)> {
        let cid = order.key.cid.clone();
        let persisted = match self.orders.find_by_client_order_id(cid.0.as_str()).await {
            Ok(Some(persisted)) => persisted,
            _ => return None,
        };

        let (status, filled_price, filled_quantity, exchange_order_id) =
            Self::order_state_to_status(&order.state, persisted.filled_quantity)?;

        Some((
            persisted.bot_id.clone(),
            CycleEvent::ExecutionReport(crate::event::ExecutionReportEvent {
                bot: persisted.bot_id,
                client_order_id: persisted.client_order_id,
                exchange_order_id,
                status,
                filled_price,
                filled_quantity,
                event_time: chrono::Utc::now(),
            }),
        ))
    }

    /// `None` for states with no settled outcome yet (`OpenInFlight`/`CancelInFlight`) - nothing
    /// to report until the exchange resolves them one way or the other.
    fn order_state_to_status(
        state: &OrderState,
        fallback_quantity: Decimal,
    ) -> Option<(
        OrderStatus,
        Option<Decimal>,
        Decimal,
        Option<gridforge_execution::order::id::OrderId>,
    )> {
        match state {
            OrderState::Active(ActiveOrderState::Open(open)) => {
                let status = if open.is_fully_filled() {
                    OrderStatus::Filled
                } else if open.filled_quantity.is_zero() {
                    OrderStatus::Open
                } else {
                    OrderStatus::PartiallyFilled
                };
                Some((status, Some(open.price), open.filled_quantity, Some(open.id.clone())))
            }
            OrderState::Active(ActiveOrderState::OpenInFlight(_))
            | OrderState::Active(ActiveOrderState::CancelInFlight(_)) => None,
            OrderState::Inactive(InactiveOrderState::Cancelled(cancelled)) => {
                Some((OrderStatus::Cancelled, None, fallback_quantity, Some(cancelled.id.clone())))
            }
            OrderState::Inactive(InactiveOrderState::FullyFilled) => {
                Some((OrderStatus::Filled, None, fallback_quantity, None))
            }
            OrderState::Inactive(InactiveOrderState::Failed(_)) => {
                Some((OrderStatus::Failed, None, fallback_quantity, None))
            }
            // No persisted status distinguishes "expired" from a plain cancel; both just mean the
            // order is off the book without having filled.
            OrderState::Inactive(InactiveOrderState::Expired) => {
                Some((OrderStatus::Cancelled, None, fallback_quantity, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_execution::{client::mock::MockExecutionClient, trade::TradeId};
    use rust_decimal_macros::dec;

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

    fn build_supervisor(pool: PgPool) -> Arc<BotSupervisor<MockExecutionClient>> {
        BotSupervisor::new(
            MockExecutionClient::new(),
            BotRepository::new(pool.clone()),
            OrderRepository::new(pool.clone()),
            CycleRepository::new(pool),
        )
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn create_bot_persists_and_emits_data_update(pool: PgPool) {
        let supervisor = build_supervisor(pool);
        let mut notifications = supervisor.subscribe();

        let bot = supervisor
            .create_bot("user-1", "acct-1", "bot-a", "BTCUSDT", Direction::Long, params())
            .await
            .unwrap();

        match notifications.recv().await.unwrap() {
            BotNotification::DataUpdate { action, bot: notified, .. } => {
                assert_eq!(action, BotDataAction::Created);
                assert_eq!(notified.id, bot.id);
            }
            other => panic!("expected DataUpdate, got {other:?}"),
        }
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn start_bot_opens_cycle_and_places_base_order(pool: PgPool) {
        let supervisor = build_supervisor(pool.clone());
        let bot = supervisor
            .create_bot("user-1", "acct-1", "bot-a", "BTCUSDT", Direction::Long, params())
            .await
            .unwrap();

        supervisor.start_bot(&bot.id).await.unwrap();

        let orders = OrderRepository::new(pool.clone());
        let persisted = orders.list_by_bot(&bot.id).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].role, OrderRole::Base);
        assert_eq!(persisted[0].status, OrderStatus::Open);

        let bots = BotRepository::new(pool);
        let refreshed = bots.find(&bot.id).await.unwrap();
        assert_eq!(refreshed.status, BotStatus::Active);
    }

    #[sqlx::test(migrations = "../persistence/migrations")]
    async fn stop_bot_liquidates_open_position_and_marks_inactive(pool: PgPool) {
        let supervisor = build_supervisor(pool.clone());
        let bot = supervisor
            .create_bot("user-1", "acct-1", "bot-a", "BTCUSDT", Direction::Long, params())
            .await
            .unwrap();
        supervisor.start_bot(&bot.id).await.unwrap();

        let orders = OrderRepository::new(pool.clone());
        let base_order = orders
            .list_by_bot(&bot.id)
            .await
            .unwrap()
            .into_iter()
            .find(|order| order.role == OrderRole::Base)
            .unwrap();

        supervisor
            .dispatch_account_event(AccountEventKind::Trade(Trade::new(
                TradeId::new("trade-1"),
                InstrumentNameExchange::new("BTCUSDT"),
                base_order.exchange_order_id.clone().unwrap(),
                chrono::Utc::now(),
                Side::Buy,
                dec!(50000),
                dec!(0.002),
                gridforge_execution::trade::AssetFees::default(),
            )))
            .await;

        supervisor.stop_bot(&bot.id).await.unwrap();

        let bots = BotRepository::new(pool.clone());
        let refreshed = bots.find(&bot.id).await.unwrap();
        assert_eq!(refreshed.status, BotStatus::Inactive);

        let final_orders = orders.list_by_bot(&bot.id).await.unwrap();
        assert!(final_orders.iter().any(|order| order.role == OrderRole::Liquidation));
    }
}
