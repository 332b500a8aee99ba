use derive_more::Constructor;
use gridforge_integration::protocol::http::rest::RestRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, Constructor)]
pub struct ExchangeInfoRequest {
    pub params: ExchangeInfoParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct ExchangeInfoParams {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    Price { #[serde(rename = "tickSize")] tick_size: Decimal },
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: Decimal,
        #[serde(rename = "minQty")]
        min_qty: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional { #[serde(rename = "minNotional")] min_notional: Decimal },
    #[serde(rename = "NOTIONAL")]
    Notional { #[serde(rename = "minNotional")] min_notional: Decimal },
    #[serde(other)]
    Other,
}

impl RestRequest for ExchangeInfoRequest {
    type Response = ExchangeInfoResponse;
    type QueryParams = ExchangeInfoParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/exchangeInfo")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Constructor)]
pub struct PlaceOrderRequest {
    pub params: PlaceOrderParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct PlaceOrderParams {
    pub symbol: String,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    #[serde(rename = "timeInForce", skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<&'static str>,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(rename = "newClientOrderId")]
    pub new_client_order_id: String,
    #[serde(rename = "newOrderRespType")]
    pub new_order_resp_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    #[serde(rename = "transactTime")]
    pub transact_time: i64,
    pub status: String,
    pub price: Decimal,
    #[serde(rename = "origQty")]
    pub orig_qty: Decimal,
    #[serde(rename = "executedQty")]
    pub executed_qty: Decimal,
}

impl RestRequest for PlaceOrderRequest {
    type Response = PlaceOrderResponse;
    type QueryParams = PlaceOrderParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/order")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Constructor)]
pub struct CancelOrderRequest {
    pub params: CancelOrderParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct CancelOrderParams {
    pub symbol: String,
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(
        rename = "origClientOrderId",
        skip_serializing_if = "Option::is_none"
    )]
    pub orig_client_order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub status: String,
}

impl RestRequest for CancelOrderRequest {
    type Response = CancelOrderResponse;
    type QueryParams = CancelOrderParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/order")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::DELETE
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Default, Constructor)]
pub struct GetAccountRequest {
    pub params: GetAccountParams,
}

#[derive(Debug, Clone, Default, Serialize, Constructor)]
pub struct GetAccountParams;

#[derive(Debug, Clone, Deserialize)]
pub struct GetAccountResponse {
    pub balances: Vec<BalanceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceEntry {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl RestRequest for GetAccountRequest {
    type Response = GetAccountResponse;
    type QueryParams = GetAccountParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/account")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Constructor)]
pub struct GetOpenOrdersRequest {
    pub params: GetOpenOrdersParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct GetOpenOrdersParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrderEntry {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub price: Decimal,
    #[serde(rename = "origQty")]
    pub orig_qty: Decimal,
    #[serde(rename = "executedQty")]
    pub executed_qty: Decimal,
    pub status: String,
    pub side: String,
    pub time: i64,
}

impl RestRequest for GetOpenOrdersRequest {
    type Response = Vec<OpenOrderEntry>;
    type QueryParams = GetOpenOrdersParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/openOrders")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Constructor)]
pub struct GetMyTradesRequest {
    pub params: GetMyTradesParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct GetMyTradesParams {
    pub symbol: String,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeEntry {
    pub symbol: String,
    pub id: i64,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(rename = "commission")]
    pub commission: Decimal,
    #[serde(rename = "commissionAsset")]
    pub commission_asset: String,
    pub time: i64,
    #[serde(rename = "isBuyer")]
    pub is_buyer: bool,
}

impl RestRequest for GetMyTradesRequest {
    type Response = Vec<TradeEntry>;
    type QueryParams = GetMyTradesParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/myTrades")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::GET
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Default, Constructor)]
pub struct CreateListenKeyRequest {
    pub params: CreateListenKeyParams,
}

#[derive(Debug, Clone, Default, Serialize, Constructor)]
pub struct CreateListenKeyParams;

#[derive(Debug, Clone, Deserialize)]
pub struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

impl RestRequest for CreateListenKeyRequest {
    type Response = ListenKeyResponse;
    type QueryParams = CreateListenKeyParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/userDataStream")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::POST
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}

#[derive(Debug, Clone, Constructor)]
pub struct KeepaliveListenKeyRequest {
    pub params: KeepaliveListenKeyParams,
}

#[derive(Debug, Clone, Serialize, Constructor)]
pub struct KeepaliveListenKeyParams {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveListenKeyResponse {}

impl RestRequest for KeepaliveListenKeyRequest {
    type Response = KeepaliveListenKeyResponse;
    type QueryParams = KeepaliveListenKeyParams;
    type Body = ();

    fn path(&self) -> Cow<'static, str> {
        Cow::Borrowed("/api/v3/userDataStream")
    }

    fn method() -> reqwest::Method {
        reqwest::Method::PUT
    }

    fn query_params(&self) -> Option<&Self::QueryParams> {
        Some(&self.params)
    }
}
