use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rama::{
    Service,
    http::{
        Body, Request, Response,
        client::EasyHttpWebClient,
        header::{HeaderValue, USER_AGENT},
        layer::trace::TraceLayer,
    },
    layer::Layer,
};

const UA: &str = concat!("regate/", env!("CARGO_PKG_VERSION"));

/// Outbound HTTP capability used for the registry, its token endpoint and
/// storage redirect targets.
///
/// Implementations must hand back 3xx responses untouched: redirects are
/// followed by the forwarder, never by the transport.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>>;
}

/// Rama web client with request tracing. It has no redirect layer, so
/// every hop is visible to the caller.
#[derive(Debug, Clone, Default)]
pub struct RamaTransport;

impl RamaTransport {
    pub fn new() -> Self {
        tracing::info!(user_agent = UA, "upstream transport initialized");
        Self
    }
}

#[async_trait]
impl UpstreamTransport for RamaTransport {
    async fn send(&self, mut request: Request<Body>) -> Result<Response<Body>> {
        let client = (TraceLayer::new_for_http(),).into_layer(EasyHttpWebClient::default());

        if !request.headers().contains_key(USER_AGENT) {
            request
                .headers_mut()
                .insert(USER_AGENT, HeaderValue::from_static(UA));
        }

        let uri = request.uri().clone();
        client
            .serve(request)
            .await
            .map(|response| response.map(Body::new))
            .map_err(|err| anyhow!("request to {uri} failed: {err}"))
    }
}
