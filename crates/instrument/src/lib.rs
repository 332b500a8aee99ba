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
#![allow(clippy::too_many_arguments)]

//! # Gridforge-Instrument
//! Exchange, asset and instrument identifiers, plus the per-symbol filter
//! ([`spec::InstrumentSpec`]) and deterministic quantization routines used to
//! snap prices and quantities to what an exchange will actually accept before
//! an order is submitted.
//!
//! See `README.md` for more information.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt::{Display as _, Formatter};

/// [`ExchangeId`] identifies the execution venue an [`ExchangeAccount`] talks to.
pub mod exchange;

/// Asset-related identifiers (eg/ `AssetNameExchange`).
pub mod asset;

/// Instrument-related identifiers (eg/ `InstrumentNameExchange`, `Underlying`).
pub mod instrument;

/// [`spec::InstrumentSpec`] - the exchange's declared tick/step/min-notional
/// rules for an instrument - and the [`spec::quantize_price`] /
/// [`spec::quantize_quantity`] functions that enforce them.
pub mod spec;

/// [`Side`] of an order - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Side {
    /// The opposite [`Side`] - the side a take-profit or liquidation order uses.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

/// Direction a bot trades in. `Long` bots buy the base order and sell the
/// take-profit; `Short` bots do the reverse.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side of the order that opens a cycle (base order).
    pub fn opening_side(&self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Side of the order that closes a cycle (take-profit / liquidation).
    pub fn closing_side(&self) -> Side {
        self.opening_side().opposite()
    }
}

/// A base/quote asset pair, eg/ `Underlying { base: "btc", quote: "usdt" }`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Underlying<AssetKey> {
    pub base: AssetKey,
    pub quote: AssetKey,
}

impl<AssetKey> Underlying<AssetKey> {
    pub fn new<A>(base: A, quote: A) -> Self
    where
        A: Into<AssetKey>,
    {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

impl<AssetKey> std::fmt::Display for Underlying<AssetKey>
where
    AssetKey: std::fmt::Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}
