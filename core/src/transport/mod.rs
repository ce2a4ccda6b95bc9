//! Transport layer abstraction.
//!
//! A `Transport` moves `HttpRequest`s to the server and hands back raw
//! `HttpResponse`s. It never decodes JSON and never interprets status codes;
//! that happens in the API clients. Two backends ship with the crate:
//! `HttpTransport` (pooled reqwest client) and `MemoryTransport` (canned
//! responses for tests).

mod memory;
mod pooled;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub use memory::MemoryTransport;
pub use pooled::{HttpTransport, HttpTransportConfig};

/// Failures below the API level: the server could not be reached or the
/// exchange broke off. Never produced from a server-reported error body.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid transport configuration: {0}")]
    Config(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport is closed")]
    Closed,

    #[error("no response available for {method} {path}")]
    NoResponse { method: HttpMethod, path: String },
}

/// Verb-level access to an ArangoDB host.
///
/// Implementors provide `send`; the verb helpers build the request envelope
/// and delegate to it. Implementations must be safe to share between
/// concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Get, path)).await
    }

    async fn post(&self, path: &str, content: Bytes) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Post, path).with_body(content))
            .await
    }

    async fn put(&self, path: &str, content: Bytes) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Put, path).with_body(content))
            .await
    }

    async fn patch(&self, path: &str, content: Bytes) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Patch, path).with_body(content))
            .await
    }

    async fn delete(&self, path: &str) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Delete, path)).await
    }

    async fn delete_with_body(
        &self,
        path: &str,
        content: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Delete, path).with_body(content))
            .await
    }

    async fn head(&self, path: &str, headers: HeaderMap) -> Result<HttpResponse, TransportError> {
        self.send(HttpRequest::new(HttpMethod::Head, path).with_headers(headers))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verb_helpers_build_matching_requests() {
        let transport = MemoryTransport::new();
        for _ in 0..7 {
            transport.push_response(200, serde_json::json!({}));
        }

        transport.get("_api/version").await.unwrap();
        transport.post("a", Bytes::from_static(b"1")).await.unwrap();
        transport.put("b", Bytes::from_static(b"2")).await.unwrap();
        transport.patch("c", Bytes::from_static(b"3")).await.unwrap();
        transport.delete("d").await.unwrap();
        transport
            .delete_with_body("e", Bytes::from_static(b"[]"))
            .await
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("if-none-match", "\"_x\"".parse().unwrap());
        transport.head("f", headers).await.unwrap();

        let sent: Vec<(HttpMethod, String, bool)> = transport
            .requests()
            .into_iter()
            .map(|r| (r.method, r.path, r.body.is_some()))
            .collect();
        assert_eq!(
            sent,
            vec![
                (HttpMethod::Get, "_api/version".to_string(), false),
                (HttpMethod::Post, "a".to_string(), true),
                (HttpMethod::Put, "b".to_string(), true),
                (HttpMethod::Patch, "c".to_string(), true),
                (HttpMethod::Delete, "d".to_string(), false),
                (HttpMethod::Delete, "e".to_string(), true),
                (HttpMethod::Head, "f".to_string(), false),
            ]
        );
        assert_eq!(
            transport.requests()[6].headers.get("if-none-match").unwrap(),
            "\"_x\""
        );
    }

    #[test]
    fn transport_errors_render_context() {
        let err = TransportError::NoResponse {
            method: HttpMethod::Post,
            path: "_api/transaction".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no response available for POST _api/transaction"
        );
    }
}
