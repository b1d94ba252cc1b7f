//! Bearer-token handshake with the registry's auth service.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rama::http::{Body, Method, Request, body::util::BodyExt};
use serde::Deserialize;
use url::Url;

use crate::{config::UpstreamConfig, proxy::image::RepositoryName, upstream::UpstreamTransport};

/// `repository:<name>:pull`, built per request and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenScope(String);

impl TokenScope {
    pub fn pull(repository: &RepositoryName) -> Self {
        Self(format!("repository:{repository}:pull"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Clone)]
pub struct TokenExchange {
    transport: Arc<dyn UpstreamTransport>,
    auth_url: Url,
    service: String,
}

impl TokenExchange {
    pub fn new(transport: Arc<dyn UpstreamTransport>, config: &UpstreamConfig) -> Self {
        Self {
            transport,
            auth_url: config.auth_url.clone(),
            service: config.service.clone(),
        }
    }

    /// Fetches an anonymous token for `scope`. No retry, nothing is cached.
    pub async fn fetch_token(&self, scope: &TokenScope) -> Result<String> {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("service", &self.service)
            .append_pair("scope", scope.as_str());

        tracing::debug!(%scope, "requesting registry token");

        let response = self
            .transport
            .send(get(&url)?)
            .await
            .context("requesting registry token")?;

        let status = response.status();
        if !status.is_success() {
            bail!("token endpoint returned {status}");
        }

        let body = response
            .into_body()
            .collect()
            .await
            .context("reading token response")?
            .to_bytes();
        let parsed: TokenResponse =
            serde_json::from_slice(&body).context("parsing token response")?;

        match parsed.token.or(parsed.access_token) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!("token response has no token field"),
        }
    }

    /// Forwards a client's own token request with its query string untouched.
    pub async fn passthrough(&self, query: Option<&str>) -> Result<serde_json::Value> {
        let mut url = self.auth_url.clone();
        url.set_query(query);

        let response = self
            .transport
            .send(get(&url)?)
            .await
            .context("contacting auth service")?;

        let body = response
            .into_body()
            .collect()
            .await
            .context("reading auth response")?
            .to_bytes();
        serde_json::from_slice(&body).context("auth service returned invalid JSON")
    }
}

fn get(url: &Url) -> Result<Request<Body>> {
    Request::builder()
        .method(Method::GET)
        .uri(url.as_str())
        .body(Body::empty())
        .with_context(|| format!("building request for {url}"))
}
