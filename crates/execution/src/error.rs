use gridforge_instrument::exchange::ExchangeId;
use gridforge_integration::error::SocketError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level failure returned by an [`ExecutionClient`](crate::client::ExecutionClient) method.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ClientError {
    #[error("connectivity: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("api: {0}")]
    Api(#[from] ApiError),

    #[error("failed to fetch account snapshot: {0}")]
    AccountSnapshot(String),

    #[error("failed to init account stream: {0}")]
    AccountStream(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ConnectivityError {
    #[error("exchange offline: {0}")]
    ExchangeOffline(ExchangeId),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Socket(String),
}

impl From<SocketError> for ConnectivityError {
    fn from(value: SocketError) -> Self {
        Self::Socket(value.to_string())
    }
}

/// Failure modes a Binance-compatible API can return for an order or account request, mapped
/// onto the gateway's normalised vocabulary: `RejectedByExchange`, `FilterViolation`,
/// `InsufficientBalance`, `RateLimited`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("instrument {0} invalid: {1}")]
    InstrumentInvalid(String, String),
    #[error("balance insufficient for asset {0}: {1}")]
    InsufficientBalance(String, String),
    #[error("order rejected by exchange: {0}")]
    RejectedByExchange(String),
    #[error("order violates symbol filter: {0}")]
    FilterViolation(String),
    #[error("order already cancelled")]
    OrderAlreadyCancelled,
    #[error("order already fully filled")]
    OrderAlreadyFullyFilled,
    #[error("unknown order")]
    UnknownOrder,
}

/// Failure opening or cancelling a specific order - distinct from [`ApiError`] since it carries
/// no connection/rate-limit context, only the outcome for that one order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum OrderError {
    #[error("api: {0}")]
    Api(#[from] ApiError),
    #[error("connectivity: {0}")]
    Connectivity(#[from] ConnectivityError),
}
