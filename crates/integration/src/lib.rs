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

//! # Gridforge-Integration
//! Low-level, exchange-agnostic framework for composing Http and WebSocket integrations.
//!
//! Used by `gridforge-execution` to build a robust Binance-compatible exchange integration. It is:
//! * **Low-level**: translates raw wire data into any desired data model via arbitrary transforms.
//! * **Flexible**: the signing strategy, parser, and wire format are all pluggable per exchange.
//!
//! Core abstractions:
//! - [`protocol::http::rest::client::RestClient`] - configurable signed Http client.
//! - [`protocol::websocket`] - WebSocket connect helper and reconnect primitives.
//! - [`reconnect::Event`] - communicates stream items vs. reconnect-in-progress to downstream consumers.

/// All [`Error`](std::error::Error)s generated in `gridforge-integration`.
pub mod error;

/// Http and WebSocket protocol primitives.
pub mod protocol;

/// The flexible [`metric::Metric`] type used for representing real-time Http metrics generically.
pub mod metric;

/// [`channel::Tx`] abstraction over different channel sender kinds.
pub mod channel;

/// [`reconnect::Event`] - wraps stream items with a reconnecting-in-progress marker.
pub mod reconnect;
