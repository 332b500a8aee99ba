/// Http protocol primitives: [`RestRequest`](http::rest::RestRequest), [`RestClient`](http::rest::client::RestClient),
/// signing, and response parsing.
pub mod http;

/// WebSocket connect helper and type aliases.
pub mod websocket;
