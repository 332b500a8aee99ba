use derive_more::Constructor;
use gridforge_integration::{
    error::SocketError,
    protocol::http::{
        private::{encoder::HexEncoder, RequestSigner, Signer},
        rest::RestRequest,
    },
};

/// Binance-compatible venues sign every private request the same way: HMAC-SHA256 over the
/// canonical query string, hex-encoded, attached as a `signature` query param alongside an
/// `X-MBX-APIKEY` header.
pub type BinanceSpotSigner = RequestSigner<BinanceSigner, hmac::Hmac<sha2::Sha256>, HexEncoder>;

#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct BinanceSigner {
    api_key: String,
}

pub struct BinanceSignConfig<'a> {
    pub api_key: &'a str,
    pub request_params_to_sign: String,
}

impl Signer for BinanceSigner {
    type Config<'a>
        = BinanceSignConfig<'a>
    where
        Self: 'a;

    fn config<Request>(
        &self,
        request: Request,
        _builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'_>, SocketError>
    where
        Request: RestRequest,
    {
        let request_params_to_sign = request
            .query_params()
            .map(serde_urlencoded::to_string)
            .transpose()
            .map_err(SocketError::UrlEncoded)?
            .unwrap_or_default();

        Ok(Self::Config {
            api_key: self.api_key.as_str(),
            request_params_to_sign,
        })
    }

    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: hmac::Mac,
    {
        mac.update(config.request_params_to_sign.as_bytes());
    }

    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, SocketError> {
        const HEADER_KEY_API_KEY: &str = "X-MBX-APIKEY";
        const QUERY_KEY_SIGNATURE: &str = "signature";

        builder
            .header(HEADER_KEY_API_KEY, config.api_key)
            .query(&[(QUERY_KEY_SIGNATURE, signature)])
            .build()
            .map_err(SocketError::from)
    }
}
