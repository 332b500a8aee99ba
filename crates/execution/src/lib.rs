#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Gridforge-Execution
//! The Exchange Gateway (see the top-level design docs): a normalised [`client::ExecutionClient`]
//! interface for placing/cancelling orders, fetching balances/open orders/trades, and streaming
//! account data, plus a Binance-compatible [`client::binance::BinanceSpotClient`] implementation.
//!
//! Every monetary quantity ([`balance::Balance`], [`order::Order::price`], [`trade::Trade::price`], ...)
//! is a [`rust_decimal::Decimal`] - exchange-declared tick/step sizes only round-trip exactly
//! under decimal arithmetic.

use crate::{
    balance::AssetBalance,
    error::ClientError,
    order::{
        state::{Cancelled, ExchangeOrderState, Open},
        Order,
    },
    trade::Trade,
};
use derive_more::{Constructor, From};
use gridforge_instrument::exchange::ExchangeId;
use serde::{Deserialize, Serialize};

pub mod balance;
pub mod client;
pub mod error;
pub mod market;
pub mod order;
pub mod trade;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountEvent {
    pub exchange: ExchangeId,
    pub kind: AccountEventKind,
}

impl AccountEvent {
    pub fn new<K: Into<AccountEventKind>>(exchange: ExchangeId, kind: K) -> Self {
        Self {
            exchange,
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, From)]
pub enum AccountEventKind {
    Snapshot(AccountSnapshot),
    BalanceSnapshot(AssetBalance),
    OrderSnapshot(Order),
    OrderOpened(Order<Result<Open, ClientError>>),
    OrderCancelled(Order<Result<Cancelled, ClientError>>),
    Trade(Trade),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct AccountSnapshot {
    pub exchange: ExchangeId,
    pub balances: Vec<AssetBalance>,
    pub instruments: Vec<InstrumentAccountSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct InstrumentAccountSnapshot {
    pub instrument: gridforge_instrument::instrument::InstrumentNameExchange,
    pub orders: Vec<Order<ExchangeOrderState>>,
}
