use crate::{
    error::SocketError,
    metric::{Field, Metric, Tag},
    protocol::http::{rest::RestRequest, BuildStrategy, HttpParser},
};
use bytes::Bytes;
use chrono::Utc;
use std::borrow::Cow;

/// Configurable REST client capable of executing signed [`RestRequest`]s.
///
/// Each exchange integration configures a specific combination of [`Signer`](super::super::private::Signer),
/// [`hmac::Mac`], signature [`Encoder`](super::super::private::encoder::Encoder), and [`HttpParser`].
#[derive(Debug)]
pub struct RestClient<'a, Strategy, Parser> {
    pub http_client: reqwest::Client,
    pub base_url: Cow<'a, str>,
    pub strategy: Strategy,
    pub parser: Parser,
}

impl<'a, Strategy, Parser> RestClient<'a, Strategy, Parser> {
    pub fn new<Url: Into<Cow<'a, str>>>(base_url: Url, strategy: Strategy, parser: Parser) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            strategy,
            parser,
        }
    }
}

impl<Strategy, Parser> RestClient<'_, Strategy, Parser>
where
    Strategy: BuildStrategy,
    Parser: HttpParser,
{
    /// Execute the provided [`RestRequest`], returning the parsed response alongside the
    /// [`Metric`] describing the round trip.
    pub async fn execute<Request>(
        &self,
        request: Request,
    ) -> Result<(Request::Response, Metric), Parser::OutputError>
    where
        Request: RestRequest,
    {
        let built = self.build(request)?;
        let (status, payload, latency) = self.measured_execution::<Request>(built).await?;

        self.parser
            .parse::<Request::Response>(status, &payload)
            .map(|response| (response, latency))
    }

    /// Use the provided [`RestRequest`] to construct a signed Http [`reqwest::Request`].
    pub fn build<Request>(&self, request: Request) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        let url = format!("{}{}", self.base_url, request.path());

        let mut builder = self
            .http_client
            .request(Request::method(), url)
            .timeout(Request::timeout());

        if let Some(query_params) = request.query_params() {
            builder = builder.query(query_params);
        }

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        self.strategy.build(request, builder)
    }

    /// Execute the built [`reqwest::Request`], measuring Http round trip duration.
    pub async fn measured_execution<Request>(
        &self,
        request: reqwest::Request,
    ) -> Result<(reqwest::StatusCode, Bytes, Metric), SocketError>
    where
        Request: RestRequest,
    {
        let mut latency = Metric {
            name: "http_request_duration",
            time: Utc::now().timestamp_millis() as u64,
            tags: vec![
                Tag::new("http_method", Request::method().as_str()),
                Tag::new("base_url", self.base_url.as_ref()),
                Tag::new("path", request.url().path()),
            ],
            fields: Vec::with_capacity(1),
        };

        let start = std::time::Instant::now();
        let response = self.http_client.execute(request).await?;
        let duration = start.elapsed().as_millis() as u64;

        latency
            .tags
            .push(Tag::new("status_code", response.status().as_str()));
        latency.fields.push(Field::new("duration_ms", duration as i64));

        let status_code = response.status();
        let payload = response.bytes().await?;

        Ok((status_code, payload, latency))
    }
}
