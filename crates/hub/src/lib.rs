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

//! # Gridforge-Hub
//! The Event Hub: a single WebSocket endpoint multiplexing market-data subscriptions, bot/cycle/
//! order lifecycle notifications and ad-hoc balance queries to every connected client. One task
//! per client ([`connection::handle_socket`]) reads the [`EventHub`] state shared by the whole
//! process.

pub mod connection;
pub mod error;
pub mod handlers;
pub mod market;
pub mod protocol;
pub mod state;

pub use error::HubError;
pub use state::{EventHub, ExchangeHandle};

use axum::{routing::get, Router};
use gridforge_execution::client::ExecutionClient;
use std::sync::Arc;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

/// Builds the Event Hub's axum `Router`: a single `/api/ws` upgrade route plus a liveness check,
/// CORS-restricted to the configured origins. The caller owns binding the listener and serving.
pub fn router<C>(hub: Arc<EventHub<C>>, allowed_origins: &[String]) -> Router
where
    C: ExecutionClient + Send + Sync + 'static,
    C::AccountStream: Send,
{
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/ws", get(handlers::websocket_handler::<C>))
        .with_state(hub)
        .layer(cors)
}
