use crate::error::HubError;
use crate::market::{MarketRegistry, SharedMarketRegistry};
use gridforge_core::{supervisor::BotNotification, BotSupervisor};
use gridforge_execution::{balance::AssetBalance, client::ExecutionClient, order::id::BotId};
use gridforge_instrument::asset::AssetNameExchange;
use gridforge_persistence::{bot_repository::BotRepository, models::bot::Bot};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::broadcast;

const HUB_EVENT_CHANNEL_CAPACITY: usize = 2048;
const BALANCE_FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// One configured exchange account: its live client (for ad-hoc `get_balance` calls) and the
/// [`BotSupervisor`] driving every bot running against it.
pub struct ExchangeHandle<C: ExecutionClient> {
    pub client: C,
    pub supervisor: Arc<BotSupervisor<C>>,
}

/// Process-wide hub state shared by every connected client: the merged bot/cycle/order
/// notification stream (fed by every configured exchange account's supervisor), the market-data
/// registry, and read access to bots for authenticated-delivery filtering.
pub struct EventHub<C: ExecutionClient> {
    bots: BotRepository,
    exchanges: HashMap<String, ExchangeHandle<C>>,
    market: SharedMarketRegistry,
    events: broadcast::Sender<BotNotification>,
}

impl<C> EventHub<C>
where
    C: ExecutionClient + Clone + Send + Sync + 'static,
    C::AccountStream: Send,
{
    /// `exchanges` is keyed by `exchange_account_id` - the same identifier a `get_balance`
    /// request's `exchange_id` field is matched against, and the one `Bot::exchange_account_id`
    /// carries, tying a bot to the account that trades it.
    pub fn new(
        bots: BotRepository,
        market_ws_base_url: String,
        exchanges: Vec<(String, ExchangeHandle<C>)>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(HUB_EVENT_CHANNEL_CAPACITY);

        let mut handles = HashMap::new();
        for (account_id, handle) in exchanges {
            let mut rx = handle.supervisor.subscribe();
            let tx = events.clone();
            tokio::spawn(async move {
                while let Ok(notification) = rx.recv().await {
                    if tx.send(notification).is_err() {
                        break;
                    }
                }
            });
            handles.insert(account_id, handle);
        }

        Arc::new(Self {
            bots,
            exchanges: handles,
            market: Arc::new(MarketRegistry::new(market_ws_base_url)),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BotNotification> {
        self.events.subscribe()
    }

    pub fn market(&self) -> &SharedMarketRegistry {
        &self.market
    }

    pub async fn find_bot(&self, bot_id: &BotId) -> Option<Bot> {
        self.bots.find(bot_id).await.ok()
    }

    /// Fetches balances from the named exchange account, bounded to the 8s client-facing
    /// deadline; a slower response surfaces as [`HubError::BalanceTimeout`] so the caller can
    /// answer with `balance_error` instead of hanging the connection.
    pub async fn fetch_balance(
        &self,
        exchange_account_id: &str,
        asset: Option<&str>,
    ) -> Result<Vec<AssetBalance>, HubError> {
        let handle = self
            .exchanges
            .get(exchange_account_id)
            .ok_or_else(|| HubError::UnknownExchangeAccount(exchange_account_id.to_string()))?;

        let assets: Vec<AssetNameExchange> = asset
            .map(|asset| vec![AssetNameExchange::new(asset.to_string())])
            .unwrap_or_default();

        match tokio::time::timeout(BALANCE_FETCH_TIMEOUT, handle.client.fetch_balances(&assets))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(HubError::BalanceTimeout),
        }
    }
}
