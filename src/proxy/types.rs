use std::time::Instant;

use rama::http::{Body, Method, Request};

use super::image::{API_PREFIX, is_resource_path};

/// Cache status for request tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Pass,
    Hit,
    Miss,
    Denied,
    Error,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Pass => write!(f, "pass"),
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::Miss => write!(f, "miss"),
            CacheStatus::Denied => write!(f, "denied"),
            CacheStatus::Error => write!(f, "error"),
        }
    }
}

/// Request context for tracking request lifecycle
pub struct RequestContext {
    pub start: Instant,
    pub method: Method,
    pub path: String,
    pub cache: CacheStatus,
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        Self {
            start: Instant::now(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            cache: CacheStatus::Pass,
        }
    }

    pub fn summary(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}

/// Top-level dispatch decision for an inbound path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Version,
    ApiRoot,
    Token,
    Registry,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        match path {
            "/version" => Self::Version,
            "/v2/" => Self::ApiRoot,
            "/v2/token" => Self::Token,
            _ if path.starts_with(API_PREFIX) && is_resource_path(path) => Self::Registry,
            _ => Self::NotFound,
        }
    }
}
