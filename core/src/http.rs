//! Request and response envelopes exchanged with a `Transport`.
//!
//! # Design
//! An `HttpRequest` is plain data: verb, relative path, headers and an
//! optional JSON payload. It is built per call and dropped once sent.
//!
//! An `HttpResponse` owns its body as a stream of byte chunks. The body is
//! moved into whichever call consumes it, so it is released exactly once on
//! every exit path (including early returns while decoding an error). Fakes
//! can observe the release through `ResponseBody::on_release`.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::HeaderMap;

use crate::transport::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `path` is relative to whatever base URL the transport is bound to, e.g.
/// `_api/document/users?returnNew=true`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Readable body of an `HttpResponse`.
///
/// Dropping the body releases it; a release hook registered with
/// `on_release` runs exactly once at that point.
pub struct ResponseBody {
    stream: BoxStream<'static, Result<Bytes, TransportError>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ResponseBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            release: None,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(stream::once(async move { Ok(bytes) }))
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Register a hook that runs when the body is released.
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Read the remaining stream to the end, then release the body.
    pub async fn bytes(mut self) -> Result<Bytes, TransportError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("instrumented", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// An HTTP response as returned by a `Transport`.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
