use anyhow::Context;
use clap::Parser;
use gridforge_config::{ExchangeAccountConfig, ExchangeAccountKind};
use gridforge_execution::client::binance::{ApiCredentials, BinanceSpotClient};
use gridforge_hub::{EventHub, ExchangeHandle};
use gridforge_instrument::exchange::ExchangeId;
use gridforge_persistence::{
    bot_repository::BotRepository, connect, cycle_repository::CycleRepository,
    order_repository::OrderRepository, run_migrations,
};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Multi-tenant DCA/Martingale trading core: the Cycle Manager and Bot Supervisor behind a single
/// Event Hub WebSocket endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the bind address; defaults to `0.0.0.0:<config.effective_ws_port()>`.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = gridforge_config::load_config().context("failed to load configuration")?;

    let pool = connect().await.context("failed to connect to the database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let mut exchanges = Vec::with_capacity(config.exchange_accounts.len());
    for account in config.exchange_accounts.iter().filter(|a| a.active) {
        let handle = build_exchange_handle(account, &pool);
        handle
            .supervisor
            .resume_active_bots()
            .await
            .with_context(|| format!("failed to resume bots for exchange account '{}'", account.id))?;
        exchanges.push((account.id.clone(), handle));
    }

    let market_ws_base_url = market_ws_base_url(&config.exchange_accounts);
    let bots = BotRepository::new(pool.clone());
    let hub = EventHub::new(bots, market_ws_base_url, exchanges);

    let app = gridforge_hub::router(hub, &config.allowed_origins);
    let addr = args
        .bind
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], config.effective_ws_port())));

    tracing::info!(%addr, "gridforge event hub listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_exchange_handle(
    account: &ExchangeAccountConfig,
    pool: &sqlx::PgPool,
) -> ExchangeHandle<BinanceSpotClient> {
    let exchange_id = match account.kind {
        ExchangeAccountKind::Live => ExchangeId::BinanceSpot,
        ExchangeAccountKind::Testnet => ExchangeId::BinanceSpotTestnet,
    };

    let client = BinanceSpotClient::with_exchange(
        exchange_id,
        ApiCredentials::new(account.api_key.clone(), account.api_secret.clone()),
    );

    let supervisor = gridforge_core::BotSupervisor::new(
        client.clone(),
        BotRepository::new(pool.clone()),
        OrderRepository::new(pool.clone()),
        CycleRepository::new(pool.clone()),
    );

    ExchangeHandle { client, supervisor }
}

/// Every configured account currently speaks the same Binance-compatible market-data dialect;
/// the Event Hub's registry needs exactly one base URL to subscribe against, so the first active
/// account's venue decides it. Falls back to the public mainnet stream if none are configured.
fn market_ws_base_url(accounts: &[ExchangeAccountConfig]) -> String {
    let is_testnet = accounts
        .iter()
        .find(|a| a.active)
        .map(|a| a.kind == ExchangeAccountKind::Testnet)
        .unwrap_or(false);

    if is_testnet {
        "wss://testnet.binance.vision".to_string()
    } else {
        "wss://stream.binance.com:9443".to_string()
    }
}
