mod forwarder;
pub mod handlers;
pub mod image;
pub mod response;
mod types;

use std::sync::Arc;

use anyhow::Result;
use rama::{
    Service,
    error::BoxError,
    http::{Body, HeaderValue, Method, Request, Response, StatusCode, header},
};
use tracing::{error, info};

use crate::{
    cache::{CacheStore, MemoryCache},
    config::Config,
    error::ProxyError,
    policy::WhitelistPolicy,
    upstream::UpstreamTransport,
};
use response::respond_text;

pub use forwarder::{Forwarded, RegistryForwarder};
pub use types::{CacheStatus, RequestContext, Route};

/// Main proxy service
#[derive(Clone)]
pub struct RegistryProxy {
    forwarder: RegistryForwarder,
}

impl RegistryProxy {
    pub fn new(config: &Config, transport: Arc<dyn UpstreamTransport>) -> Result<Self> {
        let policy = WhitelistPolicy::from_config(&config.policy);

        let cache: Option<Arc<dyn CacheStore>> = if config.cache.enabled {
            Some(Arc::new(MemoryCache::new(&config.cache)))
        } else {
            None
        };

        info!(
            whitelist = ?policy.entries(),
            cache_enabled = cache.is_some(),
            registry = %config.upstream.registry_url,
            "registry proxy configured"
        );

        let forwarder = RegistryForwarder::new(&config.upstream, policy, transport, cache)?;
        Ok(Self::with_forwarder(forwarder))
    }

    pub fn with_forwarder(forwarder: RegistryForwarder) -> Self {
        Self { forwarder }
    }

    async fn handle(&self, req: Request<Body>, ctx: &mut RequestContext) -> Result<Response<Body>> {
        match Route::from_path(req.uri().path()) {
            Route::Version => Ok(handlers::handle_version()),
            Route::ApiRoot => Ok(handlers::handle_api_root()),
            Route::Token => Ok(handlers::handle_token(&req, self.forwarder.tokens()).await),
            Route::Registry => {
                if !matches!(*req.method(), Method::GET | Method::HEAD) {
                    let mut resp =
                        respond_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                    resp.headers_mut()
                        .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
                    return Ok(resp);
                }

                match self.forwarder.forward(req).await {
                    Ok(forwarded) => {
                        ctx.cache = forwarded.cache;
                        Ok(forwarded.response)
                    }
                    Err(err) => {
                        if let ProxyError::WhitelistDenied { .. } = err {
                            ctx.cache = CacheStatus::Denied;
                        } else {
                            ctx.cache = CacheStatus::Error;
                            error!(summary = %ctx.summary(), error = %err, "registry request failed");
                        }
                        Ok(err.into_response())
                    }
                }
            }
            Route::NotFound => Ok(respond_text(StatusCode::NOT_FOUND, "Not Found")),
        }
    }
}

impl Service<Request<Body>> for RegistryProxy {
    type Output = Response<Body>;
    type Error = BoxError;

    async fn serve(&self, req: Request<Body>) -> Result<Self::Output, Self::Error> {
        let mut ctx = RequestContext::from_request(&req);

        let response = match self.handle(req, &mut ctx).await {
            Ok(resp) => resp,
            Err(err) => {
                ctx.cache = CacheStatus::Error;
                error!(
                    summary = %ctx.summary(),
                    duration_ms = ctx.start.elapsed().as_millis(),
                    error = ?err,
                    "request failed"
                );
                respond_text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Internal Server Error: {err:#}"),
                )
            }
        };

        info!(
            summary = %ctx.summary(),
            response_code = response.status().as_u16(),
            duration_ms = ctx.start.elapsed().as_millis(),
            cache_status = %ctx.cache,
            "request handled"
        );

        Ok(response)
    }
}
