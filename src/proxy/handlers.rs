use rama::http::{Body, Request, Response, StatusCode};
use serde_json::json;
use tracing::error;

use super::response::{respond_json, respond_text};
use crate::token::TokenExchange;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handles `/version`
pub fn handle_version() -> Response<Body> {
    respond_json(StatusCode::OK, &json!({ "version": VERSION }))
}

/// Handles `/v2/`, the registry API version check
pub fn handle_api_root() -> Response<Body> {
    respond_json(StatusCode::OK, &json!({ "message": "Docker Registry Proxy" }))
}

/// Handles `/v2/token` by relaying the client's query to the auth service
pub async fn handle_token(req: &Request<Body>, tokens: &TokenExchange) -> Response<Body> {
    match tokens.passthrough(req.uri().query()).await {
        Ok(document) => respond_json(StatusCode::OK, &document),
        Err(err) => {
            error!(error = ?err, "auth passthrough failed");
            respond_text(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Authentication failed: {err:#}"),
            )
        }
    }
}
