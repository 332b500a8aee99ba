//! One task per connected client, driving a single [`WebSocket`]. All frames to this client are
//! serialized through `out_tx` (the single-writer queue); the socket read loop, the 30s ping
//! keepalive and the merged bot-notification stream all feed that same queue rather than writing
//! to the socket directly, so ordering per client is never in question even though several
//! sources race to produce frames.

use crate::protocol::{
    order_status_str, BalancePayload, BotCyclePayload, BotDataPayload, BotStatusPayload,
    BotSummary, ClientMessage, KlinePayload, OrderEventPayload, ServerMessage, StreamDataType,
    TickerPayload,
};
use crate::state::EventHub;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use gridforge_core::supervisor::BotNotification;
use gridforge_execution::client::ExecutionClient;
use gridforge_execution::market::{MarketDataKind, MarketEvent};
use gridforge_persistence::models::{bot::BotStatus, order::OrderStatus};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const MAX_MISSED_PONGS: u32 = 2;

pub async fn handle_socket<C>(socket: WebSocket, hub: Arc<EventHub<C>>)
where
    C: ExecutionClient + Clone + Send + Sync + 'static,
    C::AccountStream: Send,
{
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    send(&out_tx, &ServerMessage::Connected);

    let mut user_id: Option<String> = None;
    let mut market_tasks: HashMap<String, JoinHandle<()>> = HashMap::new();
    let mut missed_pongs = 0u32;
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    let mut events_rx = hub.subscribe_events();

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("client missed two consecutive pongs, disconnecting");
                    break;
                }
                missed_pongs += 1;
                if out_tx.send(Message::Ping(Vec::new())).is_err() {
                    break;
                }
            }
            notification = events_rx.recv() => {
                match notification {
                    Ok(notification) => handle_bot_notification(&hub, &user_id, notification, &out_tx).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "client lagged the bot-notification stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                handle_client_message(&hub, message, &mut user_id, &mut market_tasks, &out_tx).await;
                            }
                            Err(error) => debug!(?error, "unrecognised client message"),
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(error)) => {
                        warn!(?error, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    for (_, task) in market_tasks.drain() {
        task.abort();
    }
    writer.abort();
    info!("client connection closed");
}

fn send(out_tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match message.to_text() {
        Ok(text) => {
            let _ = out_tx.send(Message::Text(text));
        }
        Err(error) => warn!(?error, "failed to serialize outgoing message"),
    }
}

async fn handle_client_message<C>(
    hub: &Arc<EventHub<C>>,
    message: ClientMessage,
    user_id: &mut Option<String>,
    market_tasks: &mut HashMap<String, JoinHandle<()>>,
    out_tx: &mpsc::UnboundedSender<Message>,
) where
    C: ExecutionClient + Clone + Send + Sync + 'static,
    C::AccountStream: Send,
{
    match message {
        ClientMessage::Authenticate { user_id: uid, .. } => {
            info!(user_id = %uid, "client authenticated");
            *user_id = Some(uid);
        }
        ClientMessage::Subscribe { symbols } => {
            for symbol in symbols {
                subscribe_market(hub, symbol, MarketDataKind::Ticker, market_tasks, out_tx);
            }
        }
        ClientMessage::ConfigureStream {
            data_type,
            symbols,
            interval,
        } => {
            let kind = match data_type {
                StreamDataType::Ticker => MarketDataKind::Ticker,
                StreamDataType::Kline => MarketDataKind::Kline {
                    interval: interval.unwrap_or_else(|| "1m".to_string()),
                },
            };
            for symbol in symbols {
                subscribe_market(hub, symbol, kind.clone(), market_tasks, out_tx);
            }
        }
        ClientMessage::GetBalance { exchange_id, asset } => {
            match hub.fetch_balance(&exchange_id, asset.as_deref()).await {
                Ok(balances) => send(
                    out_tx,
                    &ServerMessage::BalanceUpdate {
                        exchange_id,
                        data: BalancePayload { balances },
                    },
                ),
                Err(error) => send(
                    out_tx,
                    &ServerMessage::BalanceError {
                        exchange_id,
                        error: error.to_string(),
                    },
                ),
            }
        }
        ClientMessage::Unsubscribe => {
            for (_, task) in market_tasks.drain() {
                task.abort();
            }
        }
        ClientMessage::ChangeSubscription { symbol, interval } => {
            let prefix = format!("{}@", symbol.to_uppercase());
            let stale: Vec<String> = market_tasks
                .keys()
                .filter(|key| key.starts_with(&prefix))
                .cloned()
                .collect();
            for key in stale {
                if let Some(task) = market_tasks.remove(&key) {
                    task.abort();
                }
            }

            let kind = match interval {
                Some(interval) => MarketDataKind::Kline { interval },
                None => MarketDataKind::Ticker,
            };
            subscribe_market(hub, symbol, kind, market_tasks, out_tx);
        }
    }
}

fn subscribe_market<C>(
    hub: &Arc<EventHub<C>>,
    symbol: String,
    kind: MarketDataKind,
    market_tasks: &mut HashMap<String, JoinHandle<()>>,
    out_tx: &mpsc::UnboundedSender<Message>,
) where
    C: ExecutionClient + Clone + Send + Sync + 'static,
    C::AccountStream: Send,
{
    let key = format!("{}@{}", symbol.to_uppercase(), kind.tag());
    if market_tasks.contains_key(&key) {
        return;
    }

    let hub = Arc::clone(hub);
    let out_tx = out_tx.clone();
    let task = tokio::spawn(async move {
        let mut rx = hub.market().subscribe(&symbol, kind).await;
        loop {
            match rx.recv().await {
                Ok(MarketEvent::Ticker(ticker)) => {
                    send(
                        &out_tx,
                        &ServerMessage::TickerUpdate {
                            data: TickerPayload::from(ticker),
                        },
                    );
                }
                Ok(MarketEvent::Kline(kline)) => {
                    send(
                        &out_tx,
                        &ServerMessage::KlineUpdate {
                            data: KlinePayload::from(kline),
                        },
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "client lagged a market-data feed, dropping it");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    market_tasks.insert(key, task);
}

async fn handle_bot_notification<C>(
    hub: &Arc<EventHub<C>>,
    user_id: &Option<String>,
    notification: BotNotification,
    out_tx: &mpsc::UnboundedSender<Message>,
) where
    C: ExecutionClient + Clone + Send + Sync + 'static,
    C::AccountStream: Send,
{
    let Some(user_id) = user_id else {
        return;
    };

    // Carries its own `bot`, unlike the other variants - a deleted bot's row is already gone by
    // the time this fires, so there is nothing left for `hub.find_bot` to look up.
    if let BotNotification::DataUpdate { action, bot, .. } = notification {
        if &bot.user_id == user_id {
            send(
                out_tx,
                &ServerMessage::BotDataUpdate {
                    data: BotDataPayload {
                        action: action.into(),
                        bot: BotSummary::from(&bot),
                    },
                },
            );
        }
        return;
    }

    let bot_id = match &notification {
        BotNotification::StatusUpdate { bot_id, .. } => bot_id,
        BotNotification::CycleUpdate { bot_id, .. } => bot_id,
        BotNotification::OrderUpdate { bot_id, .. } => bot_id,
        BotNotification::DataUpdate { .. } => return,
    };

    let Some(bot) = hub.find_bot(bot_id).await else {
        return;
    };
    if &bot.user_id != user_id {
        return;
    }

    let message = match notification {
        BotNotification::StatusUpdate { status, message, .. } => ServerMessage::BotStatusUpdate {
            data: BotStatusPayload {
                bot_id: bot.id.0.to_string(),
                status,
                is_active: status == BotStatus::Active,
                message,
            },
        },
        BotNotification::CycleUpdate { cycle, .. } => ServerMessage::BotCycleUpdate {
            data: BotCyclePayload::new(&cycle),
        },
        BotNotification::OrderUpdate {
            client_order_id,
            status,
            filled_price,
            filled_quantity,
            ..
        } => {
            let payload = OrderEventPayload {
                bot_id: bot.id.0.to_string(),
                client_order_id: client_order_id.0.to_string(),
                status: order_status_str(status).to_string(),
                filled_price,
                filled_quantity,
            };

            if status == OrderStatus::Filled {
                ServerMessage::OrderFillNotification { data: payload }
            } else {
                ServerMessage::OrderStatusUpdate { data: payload }
            }
        }
        BotNotification::DataUpdate { .. } => return,
    };

    send(out_tx, &message);
}
