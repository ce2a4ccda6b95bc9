//! In-memory transport that serves canned responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::header::HeaderMap;

use super::{Transport, TransportError};
use crate::http::{HttpRequest, HttpResponse, ResponseBody};

enum Canned {
    Response {
        status: u16,
        headers: HeaderMap,
        chunks: Vec<Bytes>,
        truncated: bool,
    },
    Failure(String),
}

/// A transport for tests.
///
/// Responses are served in FIFO order. Every request is recorded, and every
/// response body it hands out is instrumented so tests can assert that the
/// client released it.
#[derive(Default)]
pub struct MemoryTransport {
    responses: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<HttpRequest>>,
    released: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response.
    pub fn push_response(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push_raw(status, body.to_string())
    }

    /// Queue a response with an arbitrary body.
    pub fn push_raw(&self, status: u16, body: impl Into<Bytes>) -> &Self {
        self.push_with_headers(status, HeaderMap::new(), body)
    }

    pub fn push_with_headers(
        &self,
        status: u16,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> &Self {
        lock(&self.responses).push_back(Canned::Response {
            status,
            headers,
            chunks: vec![body.into()],
            truncated: false,
        });
        self
    }

    /// Queue a response whose body stream fails after the first chunk.
    pub fn push_truncated(&self, status: u16, first_chunk: impl Into<Bytes>) -> &Self {
        lock(&self.responses).push_back(Canned::Response {
            status,
            headers: HeaderMap::new(),
            chunks: vec![first_chunk.into()],
            truncated: true,
        });
        self
    }

    /// Queue a connection-level failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        lock(&self.responses).push_back(Canned::Failure(message.into()));
        self
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of response bodies released by their consumers.
    pub fn released_bodies(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Canned responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = request.method;
        let path = request.path.clone();
        lock(&self.requests).push(request);

        let canned = lock(&self.responses).pop_front();
        match canned {
            None => Err(TransportError::NoResponse { method, path }),
            Some(Canned::Failure(message)) => Err(TransportError::Connection(message)),
            Some(Canned::Response {
                status,
                headers,
                chunks,
                truncated,
            }) => {
                let mut items: Vec<Result<Bytes, TransportError>> =
                    chunks.into_iter().map(Ok).collect();
                if truncated {
                    items.push(Err(TransportError::Body("connection reset".to_string())));
                }
                let released = Arc::clone(&self.released);
                let body = ResponseBody::from_stream(stream::iter(items)).on_release(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                });
                Ok(HttpResponse {
                    status,
                    headers,
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[tokio::test]
    async fn serves_responses_in_order() {
        let transport = MemoryTransport::new();
        transport.push_raw(200, "first").push_raw(404, "second");

        let first = transport.get("one").await.unwrap();
        let second = transport.get("two").await.unwrap();
        assert_eq!(first.status, 200);
        assert_eq!(second.status, 404);
        assert_eq!(first.body.bytes().await.unwrap(), "first");
        assert_eq!(second.body.bytes().await.unwrap(), "second");
        assert_eq!(transport.pending(), 0);
        assert_eq!(transport.released_bodies(), 2);
    }

    #[tokio::test]
    async fn empty_queue_is_a_transport_error() {
        let transport = MemoryTransport::new();
        let err = transport.get("_api/version").await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::NoResponse { method: HttpMethod::Get, .. }
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_as_connection_error() {
        let transport = MemoryTransport::new();
        transport.push_failure("connection refused");
        let err = transport.get("x").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(ref m) if m == "connection refused"));
    }

    #[tokio::test]
    async fn truncated_body_fails_mid_stream() {
        let transport = MemoryTransport::new();
        transport.push_truncated(200, "[{\"_id\":");
        let response = transport.get("x").await.unwrap();
        assert!(matches!(
            response.body.bytes().await,
            Err(TransportError::Body(_))
        ));
        assert_eq!(transport.released_bodies(), 1);
    }

    #[tokio::test]
    async fn unreleased_body_is_not_counted() {
        let transport = MemoryTransport::new();
        transport.push_raw(200, "{}");
        let response = transport.get("x").await.unwrap();
        assert_eq!(transport.released_bodies(), 0);
        drop(response);
        assert_eq!(transport.released_bodies(), 1);
    }
}
