//! Market-data subscription streams: ticker and kline WebSocket feeds, kept separate from
//! [`crate::client::ExecutionClient`] because the Event Hub subscribes to these per-symbol on
//! behalf of many clients at once, rather than per account.

use chrono::{DateTime, TimeZone, Utc};
use derive_more::Constructor;
use gridforge_integration::{protocol::websocket::connect, reconnect::Event};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Which market-data channel a subscription wants, mirroring Binance's stream-name suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarketDataKind {
    Ticker,
    Kline { interval: String },
}

impl MarketDataKind {
    /// The Binance stream-name suffix for this kind, e.g. `ticker` or `kline_1m`. Also doubles as
    /// a stable map key for callers that fan one upstream stream out to many subscribers.
    pub fn tag(&self) -> String {
        match self {
            Self::Ticker => "ticker".to_string(),
            Self::Kline { interval } => format!("kline_{interval}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Constructor, Serialize, Deserialize)]
pub struct TickerUpdate {
    pub symbol: String,
    pub price: Decimal,
    pub time_exchange: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Constructor, Serialize, Deserialize)]
pub struct KlineUpdate {
    pub symbol: String,
    pub interval: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Ticker(TickerUpdate),
    Kline(KlineUpdate),
}

/// Subscribes to a single symbol/kind stream and forwards parsed events until the receiving end
/// of `tx` is dropped. Reconnects with the same doubling backoff as the user data stream; emits
/// `Event::Reconnecting` on every (re)connect attempt so a caller fanning this out to many
/// Event Hub clients can mark the feed stale without guessing.
pub async fn run(
    ws_base_url: String,
    symbol: String,
    kind: MarketDataKind,
    tx: mpsc::UnboundedSender<Event<(), MarketEvent>>,
) {
    use futures::StreamExt;

    let stream_name = format!("{}@{}", symbol.to_lowercase(), kind.tag());
    let url = format!("{ws_base_url}/ws/{stream_name}");
    let mut backoff = BACKOFF_INITIAL;

    loop {
        if tx.send(Event::Reconnecting(())).is_err() {
            return;
        }

        let mut socket = match connect(url.as_str()).await {
            Ok(socket) => {
                backoff = BACKOFF_INITIAL;
                socket
            }
            Err(error) => {
                warn!(?error, ?backoff, %stream_name, "market stream: connect failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_MAX);
                continue;
            }
        };

        loop {
            match socket.next().await {
                Some(Ok(message)) => {
                    if let Some(event) = parse_market_message(&symbol, &kind, message) {
                        if tx.send(Event::Item(event)).is_err() {
                            return;
                        }
                    }
                }
                Some(Err(error)) => {
                    error!(?error, %stream_name, "market stream: websocket error");
                    break;
                }
                None => {
                    warn!(%stream_name, "market stream: websocket closed by server");
                    break;
                }
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}

fn parse_market_message(
    symbol: &str,
    kind: &MarketDataKind,
    message: gridforge_integration::protocol::websocket::WsMessage,
) -> Option<MarketEvent> {
    use gridforge_integration::protocol::websocket::WsMessage;

    let WsMessage::Text(payload) = message else {
        return None;
    };

    let value: serde_json::Value = match serde_json::from_str(&payload) {
        Ok(value) => value,
        Err(error) => {
            debug!(?error, "market stream: unparseable payload");
            return None;
        }
    };

    match kind {
        MarketDataKind::Ticker => {
            let price: Decimal = value.get("c")?.as_str()?.parse().ok()?;
            let time_exchange = value
                .get("E")
                .and_then(|v| v.as_i64())
                .map(millis_to_datetime)
                .unwrap_or_else(Utc::now);

            Some(MarketEvent::Ticker(TickerUpdate::new(
                symbol.to_string(),
                price,
                time_exchange,
            )))
        }
        MarketDataKind::Kline { interval } => {
            let k = value.get("k")?;
            Some(MarketEvent::Kline(KlineUpdate::new(
                symbol.to_string(),
                interval.clone(),
                k.get("o")?.as_str()?.parse().ok()?,
                k.get("h")?.as_str()?.parse().ok()?,
                k.get("l")?.as_str()?.parse().ok()?,
                k.get("c")?.as_str()?.parse().ok()?,
                k.get("v")?.as_str()?.parse().ok()?,
                k.get("T")
                    .and_then(|v| v.as_i64())
                    .map(millis_to_datetime)
                    .unwrap_or_else(Utc::now),
                k.get("x").and_then(|v| v.as_bool()).unwrap_or(false),
            )))
        }
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ticker_payload() {
        let payload = gridforge_integration::protocol::websocket::WsMessage::Text(
            r#"{"e":"24hrTicker","E":1700000000000,"s":"BTCUSDT","c":"50123.45"}"#.to_string(),
        );

        let event = parse_market_message("BTCUSDT", &MarketDataKind::Ticker, payload).unwrap();
        match event {
            MarketEvent::Ticker(ticker) => {
                assert_eq!(ticker.symbol, "BTCUSDT");
                assert_eq!(ticker.price, "50123.45".parse::<Decimal>().unwrap());
            }
            MarketEvent::Kline(_) => panic!("expected ticker"),
        }
    }

    #[test]
    fn parses_kline_payload() {
        let payload = gridforge_integration::protocol::websocket::WsMessage::Text(
            r#"{"e":"kline","E":1700000000000,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000059999,"o":"50000.00","c":"50123.45","h":"50200.00","l":"49900.00","v":"12.5","x":false}}"#.to_string(),
        );

        let event = parse_market_message(
            "BTCUSDT",
            &MarketDataKind::Kline {
                interval: "1m".to_string(),
            },
            payload,
        )
        .unwrap();

        match event {
            MarketEvent::Kline(kline) => {
                assert_eq!(kline.interval, "1m");
                assert!(!kline.is_closed);
            }
            MarketEvent::Ticker(_) => panic!("expected kline"),
        }
    }
}
