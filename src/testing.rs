//! Scripted doubles for the transport and cache seams.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use rama::http::{
    Body, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, body::util::BodyExt,
    header,
};

use crate::cache::{CacheStore, CachedEntry, MemoryCache};
use crate::upstream::UpstreamTransport;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

/// Replies from a queue, in order, and remembers every request.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Response<Body>, String>>>,
    seen: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Response<Body>) {
        self.replies.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        self.replies.lock().push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl UpstreamTransport for MockTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        self.seen.lock().push(RecordedRequest {
            method: request.method().clone(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
        });
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response for {}", request.uri())),
        }
    }
}

/// Counts calls on the way to a real store.
pub struct CountingCache {
    inner: MemoryCache,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingCache {
    pub fn new(inner: MemoryCache) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingCache {
    async fn get(&self, key: &str) -> Option<CachedEntry> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, entry: CachedEntry) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, entry).await;
    }

    fn admits(&self, len: u64) -> bool {
        self.inner.admits(len)
    }
}

pub fn json_response(status: StatusCode, body: &'static str) -> Response<Body> {
    with_type(status, body, "application/json")
}

pub fn text_response(status: StatusCode, body: &'static str) -> Response<Body> {
    with_type(status, body, "text/plain")
}

pub fn redirect_response(status: StatusCode, location: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(location));
    response
}

/// Body without a `content-length`, as with chunked transfer.
pub fn chunked_response(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
}

fn with_type(status: StatusCode, body: &'static str, content_type: &'static str) -> Response<Body> {
    let mut response = chunked_response(status, body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    response
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
