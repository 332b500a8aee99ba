use crate::{
    balance::AssetBalance,
    error::{ClientError, OrderError},
    order::{
        request::{OrderRequestCancel, OrderRequestOpen, OrderResponseCancel},
        state::Open,
        Order,
    },
    trade::Trade,
    AccountEvent, AccountSnapshot,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use gridforge_instrument::{
    asset::AssetNameExchange, exchange::ExchangeId, instrument::InstrumentNameExchange,
};
use std::future::Future;

pub mod binance;
pub mod mock;

/// Normalised interface every exchange integration implements - the Exchange Gateway's
/// uniform surface over place/cancel orders, balance/order/trade queries, and account streaming.
pub trait ExecutionClient
where
    Self: Clone,
{
    const EXCHANGE: ExchangeId;

    type Config: Clone;
    type AccountStream: Stream<Item = AccountEvent>;

    fn new(config: Self::Config) -> Self;

    fn account_snapshot(
        &self,
        assets: &[AssetNameExchange],
        instruments: &[InstrumentNameExchange],
    ) -> impl Future<Output = Result<AccountSnapshot, ClientError>> + Send;

    fn account_stream(
        &self,
        assets: &[AssetNameExchange],
        instruments: &[InstrumentNameExchange],
    ) -> impl Future<Output = Result<Self::AccountStream, ClientError>> + Send;

    fn open_order(
        &self,
        request: OrderRequestOpen,
    ) -> impl Future<Output = Order<Result<Open, OrderError>>> + Send;

    fn cancel_order(
        &self,
        request: OrderRequestCancel,
    ) -> impl Future<Output = OrderResponseCancel> + Send;

    fn fetch_balances(
        &self,
        assets: &[AssetNameExchange],
    ) -> impl Future<Output = Result<Vec<AssetBalance>, ClientError>> + Send;

    fn fetch_open_orders(
        &self,
        instruments: &[InstrumentNameExchange],
    ) -> impl Future<Output = Result<Vec<Order<Open>>, ClientError>> + Send;

    /// Binance's `/myTrades` (and most venues' trade-history endpoints) require a symbol per
    /// call, unlike `fetch_open_orders` - callers fan out over `instruments` themselves.
    fn fetch_trades(
        &self,
        instruments: &[InstrumentNameExchange],
        time_since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Trade>, ClientError>> + Send;
}
