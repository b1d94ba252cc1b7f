use rama::http::{Body, Response, StatusCode};
use thiserror::Error;

use crate::proxy::response::respond_text;

/// Terminal failures of the registry pipeline. Each one ends the request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Image {repository} is not in whitelist")]
    WhitelistDenied { repository: String },
    #[error("Failed to get registry token: {0}")]
    AuthToken(String),
    #[error("Registry request failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn auth(err: &anyhow::Error) -> Self {
        Self::AuthToken(format!("{err:#}"))
    }

    pub fn upstream(err: &anyhow::Error) -> Self {
        Self::Upstream(format!("{err:#}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::WhitelistDenied { .. } => StatusCode::FORBIDDEN,
            Self::AuthToken(_) | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text response echoing the error message.
    pub fn into_response(self) -> Response<Body> {
        respond_text(self.status(), &self.to_string())
    }
}
