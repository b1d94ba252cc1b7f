use rama::http::{Body, HeaderMap, HeaderValue, Response, StatusCode, header};

use crate::cache::MAX_CACHE_AGE_SECS;

/// Headers that only describe a single connection and are never relayed.
pub const HOP_BY_HOP: [header::HeaderName; 5] = [
    header::CONNECTION,
    header::TE,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

const KEEP_ALIVE: &str = "keep-alive";
const PROXY_CONNECTION: &str = "proxy-connection";

/// `public, max-age=2592000`
pub fn cache_control_value() -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={MAX_CACHE_AGE_SECS}"))
        .unwrap_or_else(|_| HeaderValue::from_static("public"))
}

/// Overwrites whatever caching policy upstream chose.
pub fn apply_cache_policy(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, cache_control_value());
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(KEEP_ALIVE);
    headers.remove(PROXY_CONNECTION);
}

/// Responds with plain text
pub fn respond_text(status: StatusCode, body: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_owned()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Responds with a JSON document
pub fn respond_json(status: StatusCode, body: &serde_json::Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_control_uses_thirty_days() {
        assert_eq!(cache_control_value(), "public, max-age=2592000");
    }

    #[test]
    fn apply_cache_policy_overwrites_upstream_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        apply_cache_policy(&mut headers);
        assert_eq!(headers.get_all(header::CACHE_CONTROL).iter().count(), 1);
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=2592000");
    }

    #[test]
    fn strip_hop_by_hop_keeps_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ETAG));
    }

    #[test]
    fn respond_json_sets_content_type() {
        let resp = respond_json(StatusCode::OK, &serde_json::json!({"version": "1"}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }
}
