//! In-memory [`ExecutionClient`] test double, standing in for a live exchange connection in
//! Cycle Manager and Bot Supervisor tests.

use crate::{
    balance::AssetBalance,
    client::ExecutionClient,
    error::{ClientError, OrderError},
    order::{
        id::OrderId,
        request::{OrderRequestCancel, OrderRequestOpen, OrderResponseCancel},
        state::{Cancelled, Open},
        Order,
    },
    trade::Trade,
    AccountEvent, AccountSnapshot, InstrumentAccountSnapshot,
};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use gridforge_instrument::{
    asset::AssetNameExchange, exchange::ExchangeId, instrument::InstrumentNameExchange,
};
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

#[derive(Debug, Default)]
struct MockState {
    open_orders: HashMap<String, Order<Open>>,
    open_failures: HashMap<String, OrderError>,
    cancel_failures: HashMap<String, OrderError>,
    trades: Vec<Trade>,
    balances: Vec<AssetBalance>,
    next_exchange_order_id: u64,
}

/// In-memory stand-in for a live exchange connection. `open_order` succeeds immediately and
/// tracks the order as exchange-side open until [`Self::cancel_order`]'s real implementation
/// removes it or a test calls [`Self::remove_open_order`] directly (simulating a fill, or a
/// cancellation that happened while disconnected); `fetch_open_orders`/`fetch_trades` just read
/// off that same state. Unlike a real venue there's no separate actor process - Cycle Manager and
/// Bot Supervisor tests drive one deterministic scenario at a time and never need the concurrency
/// a simulated exchange would otherwise require.
#[derive(Debug, Clone)]
pub struct MockExecutionClient {
    state: Arc<Mutex<MockState>>,
    events: broadcast::Sender<AccountEvent>,
}

impl Default for MockExecutionClient {
    fn default() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            events,
        }
    }
}

impl MockExecutionClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock execution state poisoned")
    }

    /// Makes the next `open_order` for this client order id fail with `error` instead of
    /// succeeding.
    pub fn fail_open(&self, cid: &str, error: OrderError) {
        self.lock().open_failures.insert(cid.to_string(), error);
    }

    /// Makes the next `cancel_order` for this client order id fail with `error`.
    pub fn fail_cancel(&self, cid: &str, error: OrderError) {
        self.lock().cancel_failures.insert(cid.to_string(), error);
    }

    /// Takes an order off the exchange-side open book without a cancel request - how a test
    /// simulates a fill (or a cancellation from elsewhere) that happened while disconnected.
    pub fn remove_open_order(&self, cid: &str) {
        self.lock().open_orders.remove(cid);
    }

    /// Replaces the trade history `fetch_trades` serves.
    pub fn set_trades(&self, trades: Vec<Trade>) {
        self.lock().trades = trades;
    }

    pub fn set_balances(&self, balances: Vec<AssetBalance>) {
        self.lock().balances = balances;
    }

    /// Publishes an [`AccountEvent`] onto the account stream, as a live user-data message would.
    pub fn publish(&self, event: AccountEvent) {
        let _ = self.events.send(event);
    }
}

impl ExecutionClient for MockExecutionClient {
    const EXCHANGE: ExchangeId = ExchangeId::Other;

    type Config = ();
    type AccountStream = BoxStream<'static, AccountEvent>;

    fn new(_config: Self::Config) -> Self {
        Self::default()
    }

    async fn account_snapshot(
        &self,
        assets: &[AssetNameExchange],
        instruments: &[InstrumentNameExchange],
    ) -> Result<AccountSnapshot, ClientError> {
        let balances = self.fetch_balances(assets).await?;
        let open_orders = self.fetch_open_orders(instruments).await?;

        let mut by_instrument: HashMap<InstrumentNameExchange, Vec<Order<Open>>> = HashMap::new();
        for order in open_orders {
            by_instrument
                .entry(order.key.instrument.clone())
                .or_default()
                .push(order);
        }

        Ok(AccountSnapshot {
            exchange: Self::EXCHANGE,
            balances,
            instruments: instruments
                .iter()
                .map(|instrument| InstrumentAccountSnapshot {
                    instrument: instrument.clone(),
                    orders: by_instrument
                        .remove(instrument)
                        .unwrap_or_default()
                        .into_iter()
                        .map(Into::into)
                        .collect(),
                })
                .collect(),
        })
    }

    async fn account_stream(
        &self,
        _assets: &[AssetNameExchange],
        _instruments: &[InstrumentNameExchange],
    ) -> Result<Self::AccountStream, ClientError> {
        Ok(Box::pin(
            BroadcastStream::new(self.events.subscribe()).map_while(|result| result.ok()),
        ))
    }

    async fn open_order(&self, request: OrderRequestOpen) -> Order<Result<Open, OrderError>> {
        let cid = request.key.cid.0.to_string();
        let mut state = self.lock();

        if let Some(error) = state.open_failures.remove(&cid) {
            return Order::new(
                request.key,
                request.state.side,
                request.state.price,
                request.state.quantity,
                request.state.kind,
                request.state.time_in_force,
                Err(error),
            );
        }

        state.next_exchange_order_id += 1;
        let exchange_order_id = OrderId::new(format!("mock-{}", state.next_exchange_order_id));
        let open = Open::new(
            exchange_order_id,
            Utc::now(),
            request.state.price,
            request.state.quantity,
            Decimal::ZERO,
        );

        let tracked = Order::new(
            request.key.clone(),
            request.state.side,
            request.state.price,
            request.state.quantity,
            request.state.kind,
            request.state.time_in_force,
            open.clone(),
        );
        state.open_orders.insert(cid, tracked);

        Order::new(
            request.key,
            request.state.side,
            request.state.price,
            request.state.quantity,
            request.state.kind,
            request.state.time_in_force,
            Ok(open),
        )
    }

    async fn cancel_order(&self, request: OrderRequestCancel) -> OrderResponseCancel {
        let cid = request.key.cid.0.to_string();
        let mut state = self.lock();

        if let Some(error) = state.cancel_failures.remove(&cid) {
            return OrderResponseCancel::new(request.key, Err(error));
        }

        let exchange_order_id = state
            .open_orders
            .remove(&cid)
            .map(|order| order.state.id)
            .or_else(|| request.state.id.clone())
            .unwrap_or_else(|| OrderId::new("unknown"));

        OrderResponseCancel::new(request.key, Ok(Cancelled::new(exchange_order_id, Utc::now())))
    }

    async fn fetch_balances(
        &self,
        assets: &[AssetNameExchange],
    ) -> Result<Vec<AssetBalance>, ClientError> {
        let state = self.lock();
        Ok(state
            .balances
            .iter()
            .filter(|balance| assets.is_empty() || assets.contains(&balance.asset))
            .cloned()
            .collect())
    }

    async fn fetch_open_orders(
        &self,
        instruments: &[InstrumentNameExchange],
    ) -> Result<Vec<Order<Open>>, ClientError> {
        let state = self.lock();
        Ok(state
            .open_orders
            .values()
            .filter(|order| instruments.is_empty() || instruments.contains(&order.key.instrument))
            .cloned()
            .collect())
    }

    async fn fetch_trades(
        &self,
        instruments: &[InstrumentNameExchange],
        time_since: DateTime<Utc>,
    ) -> Result<Vec<Trade>, ClientError> {
        let state = self.lock();
        Ok(state
            .trades
            .iter()
            .filter(|trade| {
                (instruments.is_empty() || instruments.contains(&trade.instrument))
                    && trade.time_exchange >= time_since
            })
            .cloned()
            .collect())
    }
}
