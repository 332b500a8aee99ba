use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub mod client;

/// Default Http [`reqwest::Request`] timeout.
const DEFAULT_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A Http REST request that can be executed by a [`RestClient`](client::RestClient).
pub trait RestRequest {
    /// Expected response type if this request was successful.
    type Response: DeserializeOwned;

    /// Serialisable query parameters type - use `()` if not required for this request.
    type QueryParams: Serialize;

    /// Serialisable Body type - use `()` if not required for this request.
    type Body: Serialize;

    /// Additional path to the resource, appended to the client's base Url.
    fn path(&self) -> std::borrow::Cow<'static, str>;

    /// Http [`reqwest::Method`] of this request.
    fn method() -> reqwest::Method;

    /// Optional query parameters for this request.
    fn query_params(&self) -> Option<&Self::QueryParams> {
        None
    }

    /// Optional Body for this request.
    fn body(&self) -> Option<&Self::Body> {
        None
    }

    /// Http request timeout.
    fn timeout() -> Duration {
        DEFAULT_HTTP_REQUEST_TIMEOUT
    }
}
