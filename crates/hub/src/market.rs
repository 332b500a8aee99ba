//! Per-symbol market-data fan-out: one upstream [`gridforge_execution::market`] WebSocket feed
//! per (symbol, kind) pair, multiplexed to however many Event Hub clients have subscribed via a
//! bounded `tokio::sync::broadcast` channel. A slow client lags the channel rather than blocking
//! the publisher; `MarketFeed::subscribe`'s caller is responsible for disconnecting on `Lagged`.

use gridforge_execution::market::{self, MarketDataKind, MarketEvent};
use gridforge_integration::reconnect::Event;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

const MARKET_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
pub struct MarketRegistry {
    ws_base_url: String,
    feeds: Mutex<HashMap<String, broadcast::Sender<MarketEvent>>>,
}

impl MarketRegistry {
    pub fn new(ws_base_url: String) -> Self {
        Self {
            ws_base_url,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a receiver for `symbol`/`kind`, starting the upstream feed the first time anyone
    /// asks for it. The feed runs for the lifetime of the process once started - tearing it down
    /// when the last subscriber disconnects is left for a later pass, see `DESIGN.md`.
    pub async fn subscribe(
        &self,
        symbol: &str,
        kind: MarketDataKind,
    ) -> broadcast::Receiver<MarketEvent> {
        let key = format!("{}@{}", symbol.to_uppercase(), kind.tag());
        let mut feeds = self.feeds.lock().await;

        if let Some(tx) = feeds.get(&key) {
            return tx.subscribe();
        }

        let (tx, rx) = broadcast::channel(MARKET_CHANNEL_CAPACITY);
        feeds.insert(key.clone(), tx.clone());

        info!(%key, "market registry: starting new upstream feed");
        let ws_base_url = self.ws_base_url.clone();
        let symbol = symbol.to_string();
        tokio::spawn(async move {
            let (forward_tx, mut forward_rx) = tokio::sync::mpsc::unbounded_channel();
            let forwarder = tokio::spawn(market::run(ws_base_url, symbol, kind, forward_tx));

            while let Some(event) = forward_rx.recv().await {
                match event {
                    Event::Item(item) => {
                        // No subscribers left is not an error - the channel just idles.
                        let _ = tx.send(item);
                    }
                    Event::Reconnecting(()) => {}
                }
            }

            forwarder.abort();
        });

        rx
    }
}

pub type SharedMarketRegistry = Arc<MarketRegistry>;
