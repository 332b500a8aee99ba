use crate::error::{ApiError, ClientError, ConnectivityError};
use gridforge_integration::protocol::http::HttpParser;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct BinanceSpotHttpParser;

impl HttpParser for BinanceSpotHttpParser {
    type ApiError = BinanceHttpApiError;
    type OutputError = ClientError;

    fn parse_api_error(
        &self,
        status: reqwest::StatusCode,
        error: Self::ApiError,
    ) -> Self::OutputError {
        let mapped = match error.code {
            -1003 | -1015 => ApiError::RateLimited,
            -2010 => ApiError::RejectedByExchange(error.msg.clone()),
            -2011 => ApiError::OrderAlreadyCancelled,
            -2013 => ApiError::UnknownOrder,
            -1013 => ApiError::FilterViolation(error.msg.clone()),
            -2019 => ApiError::InsufficientBalance("quote".to_string(), error.msg.clone()),
            _ if status.is_server_error() => {
                return ClientError::Connectivity(ConnectivityError::Socket(error.msg));
            }
            _ => ApiError::RejectedByExchange(error.msg.clone()),
        };

        ClientError::Api(mapped)
    }
}

/// Binance-compatible venues report API errors as `{"code": -1234, "msg": "..."}`, regardless of
/// Http status code.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceHttpApiError {
    pub code: i64,
    pub msg: String,
}
