use crate::{error::SocketError, protocol::http::{rest::RestRequest, BuildStrategy}};
use encoder::Encoder;
use hmac::Mac;

pub mod encoder;

/// Exchange specific signing logic consumed by a [`RequestSigner`].
///
/// Implementors decide what goes into the signature (query string, body, timestamp, ...) via
/// [`Signer::Config`], and how the signed request is finally assembled via
/// [`Signer::build_signed_request`].
pub trait Signer {
    type Config<'a>
    where
        Self: 'a;

    /// Gather everything needed to compute and attach a signature for this `Request`.
    fn config<Request>(
        &self,
        request: Request,
        builder: &reqwest::RequestBuilder,
    ) -> Result<Self::Config<'_>, SocketError>
    where
        Request: RestRequest;

    /// Feed the bytes that should be signed into the provided [`Mac`].
    fn add_bytes_to_sign<M>(mac: &mut M, config: &Self::Config<'_>)
    where
        M: Mac;

    /// Attach the computed signature (and any other auth headers/params) to the request.
    fn build_signed_request(
        config: Self::Config<'_>,
        builder: reqwest::RequestBuilder,
        signature: String,
    ) -> Result<reqwest::Request, SocketError>;
}

/// [`BuildStrategy`] that signs every [`RestRequest`] using exchange specific [`Signer`] logic,
/// a keyed [`Mac`], and a signature [`Encoder`].
#[derive(Debug, Clone)]
pub struct RequestSigner<S, M, E> {
    signer: S,
    mac: M,
    encoder: E,
}

impl<S, M, E> RequestSigner<S, M, E> {
    pub fn new(signer: S, mac: M, encoder: E) -> Self {
        Self {
            signer,
            mac,
            encoder,
        }
    }
}

impl<S, M, E> BuildStrategy for RequestSigner<S, M, E>
where
    S: Signer,
    M: Mac + Clone,
    E: Encoder,
{
    fn build<Request>(
        &self,
        request: Request,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Request, SocketError>
    where
        Request: RestRequest,
    {
        let config = self.signer.config(request, &builder)?;

        let mut mac = self.mac.clone();
        S::add_bytes_to_sign(&mut mac, &config);
        let signature = self.encoder.encode(mac.finalize().into_bytes());

        S::build_signed_request(config, builder, signature)
    }
}
