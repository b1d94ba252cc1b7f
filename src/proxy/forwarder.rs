//! Registry forwarding pipeline.
//!
//! `resolve name -> whitelist -> (cache lookup) -> token -> send -> relay or
//! follow one storage redirect (cache lookup) -> stamp cache-control`. The whitelist is
//! checked before any network call. Redirect targets are requested with the
//! client's own headers, never with the registry token.

use std::sync::Arc;

use anyhow::{Context, Result};
use rama::http::{
    Body, HeaderMap, HeaderValue, Method, Request, Response, Uri, body::util::BodyExt, header,
};
use tracing::{debug, info, warn};
use url::Url;

use super::image::{API_PREFIX, RepositoryName, is_resource_path};
use super::response::{apply_cache_policy, strip_hop_by_hop};
use super::types::CacheStatus;
use crate::{
    cache::{CacheStore, CachedEntry},
    config::UpstreamConfig,
    error::ProxyError,
    policy::WhitelistPolicy,
    token::TokenExchange,
    upstream::UpstreamTransport,
};

/// Final response plus how it was produced.
pub struct Forwarded {
    pub response: Response<Body>,
    pub cache: CacheStatus,
}

#[derive(Clone)]
pub struct RegistryForwarder {
    policy: WhitelistPolicy,
    tokens: TokenExchange,
    transport: Arc<dyn UpstreamTransport>,
    cache: Option<Arc<dyn CacheStore>>,
    registry_url: Url,
    registry_host: HeaderValue,
}

impl RegistryForwarder {
    pub fn new(
        upstream: &UpstreamConfig,
        policy: WhitelistPolicy,
        transport: Arc<dyn UpstreamTransport>,
        cache: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self> {
        let registry_host = HeaderValue::from_str(&upstream.registry_authority())
            .context("registry host is not a valid header value")?;
        Ok(Self {
            policy,
            tokens: TokenExchange::new(transport.clone(), upstream),
            transport,
            cache,
            registry_url: upstream.registry_url.clone(),
            registry_host,
        })
    }

    pub fn tokens(&self) -> &TokenExchange {
        &self.tokens
    }

    pub fn policy(&self) -> &WhitelistPolicy {
        &self.policy
    }

    pub async fn forward(&self, req: Request<Body>) -> Result<Forwarded, ProxyError> {
        // `Url` resolves dot segments, so the name is taken from the path
        // that will actually be requested upstream.
        let target = self.upstream_url(req.uri());
        let path = target.path().to_owned();
        let repository = RepositoryName::from_path(&path);

        if !path.starts_with(API_PREFIX) || !self.policy.is_allowed(repository.as_str()) {
            info!(repository = %repository, "repository is not in whitelist");
            return Err(ProxyError::WhitelistDenied {
                repository: repository.to_string(),
            });
        }

        let cacheable = req.method() == Method::GET;

        if let Some(hit) = self.lookup(&target, cacheable).await {
            return Ok(hit);
        }

        let token = if is_resource_path(&path) {
            let scope = repository.pull_scope();
            let token = self.tokens.fetch_token(&scope).await.map_err(|err| {
                warn!(repository = %repository, error = ?err, "failed to get registry token");
                ProxyError::auth(&err)
            })?;
            Some(token)
        } else {
            None
        };

        let (parts, body) = req.into_parts();
        let forwarded = self
            .build_forwarded(&parts.method, &parts.headers, &target, token.as_deref(), body)
            .map_err(|err| ProxyError::upstream(&err))?;

        let response = self
            .transport
            .send(forwarded)
            .await
            .map_err(|err| ProxyError::upstream(&err))?;

        match redirect_location(&response) {
            Some(location) => {
                let location = target
                    .join(&location)
                    .with_context(|| format!("invalid redirect location {location:?}"))
                    .map_err(|err| ProxyError::upstream(&err))?;
                info!(
                    repository = %repository,
                    status = response.status().as_u16(),
                    location = %redacted(&location),
                    "following storage redirect"
                );

                if let Some(hit) = self.lookup(&location, cacheable).await {
                    return Ok(hit);
                }

                let redirect = build_redirect(&parts.method, &parts.headers, &location)
                    .map_err(|err| ProxyError::upstream(&err))?;
                let response = self
                    .transport
                    .send(redirect)
                    .await
                    .map_err(|err| ProxyError::upstream(&err))?;
                self.relay(response, location.as_str(), cacheable).await
            }
            None => self.relay(response, target.as_str(), cacheable).await,
        }
    }

    async fn lookup(&self, key: &Url, cacheable: bool) -> Option<Forwarded> {
        if !cacheable {
            return None;
        }
        let entry = self.cache.as_ref()?.get(key.as_str()).await?;
        debug!(upstream = %redacted(key), "cache hit");
        Some(Forwarded {
            response: entry.to_response(),
            cache: CacheStatus::Hit,
        })
    }

    fn upstream_url(&self, uri: &Uri) -> Url {
        let mut url = self.registry_url.clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        url
    }

    fn build_forwarded(
        &self,
        method: &Method,
        inbound: &HeaderMap,
        target: &Url,
        token: Option<&str>,
        body: Body,
    ) -> Result<Request<Body>> {
        let mut headers = inbound.clone();
        strip_hop_by_hop(&mut headers);
        headers.insert(header::HOST, self.registry_host.clone());
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("registry token is not a valid header value")?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut request = Request::builder()
            .method(method.clone())
            .uri(target.as_str())
            .body(body)
            .context("building upstream request")?;
        *request.headers_mut() = headers;
        Ok(request)
    }

    /// Stamps the cache policy and, for cacheable successes, stores the body.
    async fn relay(
        &self,
        response: Response<Body>,
        key: &str,
        cacheable: bool,
    ) -> Result<Forwarded, ProxyError> {
        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        apply_cache_policy(&mut parts.headers);

        // Only bodies of a known, admissible size are buffered; the rest stream.
        let Some(cache) = self.cache.as_ref().filter(|cache| {
            cacheable
                && parts.status.is_success()
                && content_length(&parts.headers).is_some_and(|len| cache.admits(len))
        }) else {
            return Ok(Forwarded {
                response: Response::from_parts(parts, body),
                cache: CacheStatus::Pass,
            });
        };

        let bytes = body
            .collect()
            .await
            .context("reading upstream body")
            .map_err(|err| ProxyError::upstream(&err))?
            .to_bytes();
        cache
            .put(
                key,
                CachedEntry::new(parts.status, parts.headers.clone(), bytes.clone()),
            )
            .await;

        Ok(Forwarded {
            response: Response::from_parts(parts, Body::from(bytes)),
            cache: CacheStatus::Miss,
        })
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn redirect_location(response: &Response<Body>) -> Option<String> {
    if !response.status().is_redirection() {
        return None;
    }
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Second hop to the storage backend: inbound headers only, no credentials.
fn build_redirect(method: &Method, inbound: &HeaderMap, location: &Url) -> Result<Request<Body>> {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::AUTHORIZATION);

    let mut request = Request::builder()
        .method(method.clone())
        .uri(location.as_str())
        .body(Body::empty())
        .context("building redirect request")?;
    *request.headers_mut() = headers;
    Ok(request)
}

// Signed storage URLs carry credentials in the query string.
fn redacted(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}
