use crate::{
    balance::{AssetBalance, Balance},
    client::ExecutionClient,
    error::{ApiError, ClientError, ConnectivityError, OrderError},
    order::{
        id::OrderId,
        request::{OrderRequestCancel, OrderRequestOpen, OrderResponseCancel, RequestCancel},
        state::{Cancelled, Open},
        Order, OrderKind, TimeInForce,
    },
    trade::{AssetFees, Trade, TradeId},
    AccountEvent, AccountSnapshot, InstrumentAccountSnapshot,
};
use chrono::{DateTime, TimeZone, Utc};
use derive_more::Constructor;
use gridforge_instrument::{
    asset::AssetNameExchange,
    exchange::ExchangeId,
    instrument::InstrumentNameExchange,
    spec::InstrumentSpec,
    Side,
};
use gridforge_integration::{
    protocol::http::{
        private::{encoder::HexEncoder, RequestSigner},
        rest::client::RestClient,
    },
    reconnect::Event,
};
use requests::{
    CancelOrderParams, CancelOrderRequest, ExchangeInfoParams, ExchangeInfoRequest,
    GetAccountParams, GetAccountRequest, GetMyTradesParams, GetMyTradesRequest,
    GetOpenOrdersParams, GetOpenOrdersRequest, PlaceOrderParams, PlaceOrderRequest, SymbolFilter,
};
use hmac::Mac;
use rust_decimal::Decimal;
use signer::{BinanceSigner, BinanceSpotSigner};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use http_parser::BinanceSpotHttpParser;

mod http_parser;
pub mod requests;
mod signer;
mod user_stream;

const HTTP_BASE_URL_BINANCE_SPOT: &str = "https://api.binance.com";
const HTTP_BASE_URL_BINANCE_SPOT_TESTNET: &str = "https://testnet.binance.vision";
const WS_BASE_URL_BINANCE_SPOT: &str = "wss://stream.binance.com:9443";
const WS_BASE_URL_BINANCE_SPOT_TESTNET: &str = "wss://testnet.binance.vision";

#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
}

/// Binance-compatible spot client: every `ExchangeAccount` of `kind = live|testnet` talks through
/// one of these. `Testnet` selects the sandbox base URLs; all wire semantics are identical.
#[derive(Clone)]
pub struct BinanceSpotClient {
    exchange: ExchangeId,
    credentials: ApiCredentials,
    rest_client: Arc<RestClient<'static, BinanceSpotSigner, BinanceSpotHttpParser>>,
    ws_base_url: &'static str,
    filters: Arc<RwLock<HashMap<InstrumentNameExchange, InstrumentSpec>>>,
}

impl std::fmt::Debug for BinanceSpotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceSpotClient")
            .field("exchange", &self.exchange)
            .finish_non_exhaustive()
    }
}

impl BinanceSpotClient {
    /// Construct a client against either the live or testnet venue.
    pub fn with_exchange(exchange: ExchangeId, config: ApiCredentials) -> Self {
        let hmac = hmac::Hmac::<sha2::Sha256>::new_from_slice(config.secret.as_bytes())
            .expect("ApiCredentials secret invalid length");

        let (http_base_url, ws_base_url) = if exchange.is_testnet() {
            (HTTP_BASE_URL_BINANCE_SPOT_TESTNET, WS_BASE_URL_BINANCE_SPOT_TESTNET)
        } else {
            (HTTP_BASE_URL_BINANCE_SPOT, WS_BASE_URL_BINANCE_SPOT)
        };

        Self {
            exchange,
            rest_client: Arc::new(RestClient::new(
                http_base_url,
                RequestSigner::new(
                    BinanceSigner::new(config.api_key.clone()),
                    hmac,
                    HexEncoder,
                ),
                BinanceSpotHttpParser,
            )),
            credentials: config,
            ws_base_url,
            filters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetch this instrument's [`InstrumentSpec`], consulting the cache first. Callers that
    /// suspect the cache is stale (eg/ after a `FilterViolation`) should call
    /// [`Self::refresh_symbol_filters`] instead.
    async fn symbol_filters(
        &self,
        instrument: &InstrumentNameExchange,
    ) -> Result<InstrumentSpec, ClientError> {
        if let Some(spec) = self.filters.read().await.get(instrument) {
            return Ok(*spec);
        }

        self.refresh_symbol_filters(instrument).await
    }

    async fn refresh_symbol_filters(
        &self,
        instrument: &InstrumentNameExchange,
    ) -> Result<InstrumentSpec, ClientError> {
        let request = ExchangeInfoRequest::new(ExchangeInfoParams::new(
            instrument.as_str().to_string(),
        ));

        let (response, _) = self.rest_client.execute(request).await?;

        let symbol = response
            .symbols
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Api(ApiError::InstrumentInvalid(
                instrument.as_str().to_string(),
                "unknown symbol".to_string(),
            )))?;

        let spec = symbol_filters_to_spec(&symbol.filters);
        self.filters
            .write()
            .await
            .insert(instrument.clone(), spec);

        Ok(spec)
    }
}

fn symbol_filters_to_spec(filters: &[SymbolFilter]) -> InstrumentSpec {
    let mut tick_size = Decimal::new(1, 8);
    let mut step_size = Decimal::new(1, 8);
    let mut min_qty = Decimal::ZERO;
    let mut min_notional = Decimal::ZERO;

    for filter in filters {
        match filter {
            SymbolFilter::Price { tick_size: t } => tick_size = *t,
            SymbolFilter::LotSize { step_size: s, min_qty: m } => {
                step_size = *s;
                min_qty = *m;
            }
            SymbolFilter::MinNotional { min_notional: n } | SymbolFilter::Notional { min_notional: n } => {
                min_notional = *n;
            }
            SymbolFilter::Other => {}
        }
    }

    InstrumentSpec {
        tick_size,
        step_size,
        min_qty,
        min_notional,
        price_decimals: tick_size.scale(),
        qty_decimals: step_size.scale(),
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}

impl ExecutionClient for BinanceSpotClient {
    const EXCHANGE: ExchangeId = ExchangeId::BinanceSpot;

    type Config = ApiCredentials;
    type AccountStream = tokio_stream::wrappers::UnboundedReceiverStream<AccountEvent>;

    fn new(config: Self::Config) -> Self {
        Self::with_exchange(ExchangeId::BinanceSpot, config)
    }

    async fn account_snapshot(
        &self,
        assets: &[AssetNameExchange],
        instruments: &[InstrumentNameExchange],
    ) -> Result<AccountSnapshot, ClientError> {
        let balances = self
            .fetch_balances(assets)
            .await
            .map_err(|error| ClientError::AccountSnapshot(error.to_string()))?;

        let open_orders = self
            .fetch_open_orders(instruments)
            .await
            .map_err(|error| ClientError::AccountSnapshot(error.to_string()))?;

        let mut by_instrument: HashMap<InstrumentNameExchange, Vec<Order<Open>>> = HashMap::new();
        for order in open_orders {
            by_instrument
                .entry(order.key.instrument.clone())
                .or_default()
                .push(order);
        }

        let instruments = instruments
            .iter()
            .map(|instrument| InstrumentAccountSnapshot {
                instrument: instrument.clone(),
                orders: by_instrument
                    .remove(instrument)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            })
            .collect();

        Ok(AccountSnapshot {
            exchange: Self::EXCHANGE,
            balances,
            instruments,
        })
    }

    async fn account_stream(
        &self,
        _assets: &[AssetNameExchange],
        _instruments: &[InstrumentNameExchange],
    ) -> Result<Self::AccountStream, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (account_tx, account_rx) = mpsc::unbounded_channel();

        tokio::spawn(user_stream::run(
            self.ws_base_url.to_string(),
            Arc::clone(&self.rest_client),
            tx,
        ));

        tokio::spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                match event {
                    Event::Item(account_event) => {
                        if account_tx.send(account_event).is_err() {
                            break;
                        }
                    }
                    Event::Reconnecting(()) => {
                        warn!("account stream reconnecting");
                    }
                }
            }
        });

        Ok(tokio_stream::wrappers::UnboundedReceiverStream::new(
            account_rx,
        ))
    }

    async fn open_order(&self, request: OrderRequestOpen) -> Order<Result<Open, OrderError>> {
        let instrument = request.key.instrument.clone();

        let spec = match self.symbol_filters(&instrument).await {
            Ok(spec) => spec,
            Err(error) => {
                return Order::new(
                    request.key,
                    request.state.side,
                    request.state.price,
                    request.state.quantity,
                    request.state.kind,
                    request.state.time_in_force,
                    Err(to_order_error(error)),
                );
            }
        };

        let price = spec.quantize_price(request.state.price);
        let quantity = match spec.quantize_quantity(price, request.state.quantity) {
            Ok(quantity) => quantity,
            Err(error) => {
                return Order::new(
                    request.key,
                    request.state.side,
                    price,
                    request.state.quantity,
                    request.state.kind,
                    request.state.time_in_force,
                    Err(OrderError::Api(ApiError::FilterViolation(error.to_string()))),
                );
            }
        };

        let params = PlaceOrderParams::new(
            instrument.as_str().to_string(),
            side_str(request.state.side),
            order_kind_str(request.state.kind),
            time_in_force_str(request.state.time_in_force),
            quantity,
            matches!(request.state.kind, OrderKind::Limit).then_some(price),
            request.key.cid.0.to_string(),
            "RESULT",
        );

        let outcome = self
            .rest_client
            .execute(PlaceOrderRequest::new(params))
            .await;

        let state = match outcome {
            Ok((response, _)) => Ok(Open::new(
                OrderId::new(response.order_id.to_string()),
                millis_to_datetime(response.transact_time),
                response.price,
                response.orig_qty,
                response.executed_qty,
            )),
            Err(error) => Err(to_order_error(error)),
        };

        Order::new(
            request.key,
            request.state.side,
            price,
            quantity,
            request.state.kind,
            request.state.time_in_force,
            state,
        )
    }

    async fn cancel_order(&self, request: OrderRequestCancel) -> OrderResponseCancel {
        let RequestCancel { id } = &request.state;

        let params = CancelOrderParams::new(
            request.key.instrument.as_str().to_string(),
            id.as_ref().map(|id| id.0.parse().unwrap_or_default()),
            id.is_none().then(|| request.key.cid.0.to_string()),
        );

        let outcome = self
            .rest_client
            .execute(CancelOrderRequest::new(params))
            .await;

        let state = match outcome {
            Ok((response, _)) => Ok(Cancelled::new(
                OrderId::new(response.order_id.to_string()),
                Utc::now(),
            )),
            // An unknown order on cancel is treated as already-cancelled (idempotent cancel).
            Err(ClientError::Api(ApiError::UnknownOrder)) => {
                Ok(Cancelled::new(id.clone().unwrap_or_else(|| OrderId::new("unknown")), Utc::now()))
            }
            Err(error) => Err(to_order_error(error)),
        };

        OrderResponseCancel::new(request.key, state)
    }

    async fn fetch_balances(
        &self,
        assets: &[AssetNameExchange],
    ) -> Result<Vec<AssetBalance>, ClientError> {
        let (response, _) = self
            .rest_client
            .execute(GetAccountRequest::new(GetAccountParams))
            .await?;

        let now = Utc::now();

        Ok(response
            .balances
            .into_iter()
            .map(|entry| AssetBalance::new(
                AssetNameExchange::new(entry.asset),
                Balance::new(entry.free + entry.locked, entry.free),
                now,
            ))
            .filter(|balance| assets.is_empty() || assets.contains(&balance.asset))
            .collect())
    }

    async fn fetch_open_orders(
        &self,
        instruments: &[InstrumentNameExchange],
    ) -> Result<Vec<Order<Open>>, ClientError> {
        let (response, _) = self
            .rest_client
            .execute(GetOpenOrdersRequest::new(GetOpenOrdersParams::new(None)))
            .await?;

        Ok(response
            .into_iter()
            .filter(|entry| {
                instruments.is_empty()
                    || instruments
                        .iter()
                        .any(|instrument| instrument.as_str() == entry.symbol)
            })
            .map(|entry| Order::new(
                crate::order::OrderKey::new(
                    InstrumentNameExchange::new(entry.symbol),
                    crate::order::id::BotId::new("unknown"),
                    crate::order::id::ClientOrderId::new(entry.client_order_id),
                ),
                if entry.side == "BUY" { Side::Buy } else { Side::Sell },
                entry.price,
                entry.orig_qty,
                OrderKind::Limit,
                TimeInForce::GoodUntilCancelled { post_only: false },
                Open::new(
                    OrderId::new(entry.order_id.to_string()),
                    millis_to_datetime(entry.time),
                    entry.price,
                    entry.orig_qty,
                    entry.executed_qty,
                ),
            ))
            .collect())
    }

    async fn fetch_trades(
        &self,
        instruments: &[InstrumentNameExchange],
        time_since: DateTime<Utc>,
    ) -> Result<Vec<Trade>, ClientError> {
        let start_time = time_since.timestamp_millis();
        let mut trades = Vec::new();

        for instrument in instruments {
            let (response, _) = self
                .rest_client
                .execute(GetMyTradesRequest::new(GetMyTradesParams::new(
                    instrument.as_str().to_string(),
                    Some(start_time),
                )))
                .await?;

            trades.extend(response.into_iter().map(|entry| {
                Trade::new(
                    TradeId::new(entry.id.to_string()),
                    instrument.clone(),
                    OrderId::new(entry.order_id.to_string()),
                    millis_to_datetime(entry.time),
                    if entry.is_buyer { Side::Buy } else { Side::Sell },
                    entry.price,
                    entry.qty,
                    AssetFees::new(Some(AssetNameExchange::new(entry.commission_asset)), entry.commission),
                )
            }));
        }

        Ok(trades)
    }
}

fn to_order_error(error: ClientError) -> OrderError {
    match error {
        ClientError::Api(api) => OrderError::Api(api),
        ClientError::Connectivity(connectivity) => OrderError::Connectivity(connectivity),
        ClientError::AccountSnapshot(msg) | ClientError::AccountStream(msg) => {
            OrderError::Connectivity(ConnectivityError::Socket(msg))
        }
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn order_kind_str(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Market => "MARKET",
        OrderKind::Limit => "LIMIT",
    }
}

fn time_in_force_str(tif: TimeInForce) -> Option<&'static str> {
    match tif {
        TimeInForce::GoodUntilCancelled { .. } => Some("GTC"),
        TimeInForce::FillOrKill => Some("FOK"),
        TimeInForce::ImmediateOrCancel => Some("IOC"),
    }
}
