use crate::{connection::handle_socket, state::EventHub};
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
};
use gridforge_execution::client::ExecutionClient;
use std::sync::Arc;

/// `GET /api/ws` - upgrades to the single WebSocket endpoint every client multiplexes market
/// data, bot/cycle/order events and balance queries over.
pub async fn websocket_handler<C>(
    State(hub): State<Arc<EventHub<C>>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse
where
    C: ExecutionClient + Send + Sync + 'static,
    C::AccountStream: Send,
{
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}
