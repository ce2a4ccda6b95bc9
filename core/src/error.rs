//! Error types for the ArangoDB client.
//!
//! # Design
//! Four failure kinds are kept apart:
//! - `Api`: the server answered with a non-2xx status and (usually) an error
//!   envelope. Callers branch on `error_num`, never on the message text.
//! - `Transport`: the server could not be reached or the exchange broke off.
//! - `Serialization` / `Deserialization`: a body did not encode, or a
//!   response did not match the requested shape.
//!
//! Per-item failures inside a batch are not errors at this level; they are
//! returned as data (see `document::DocumentsResponse`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;
use crate::transport::TransportError;

/// Well-known server error numbers.
pub mod codes {
    pub const BAD_PARAMETER: i32 = 10;
    pub const HTTP_NOT_FOUND: i32 = 404;
    pub const HTTP_CORRUPTED_JSON: i32 = 600;
    pub const ARANGO_CONFLICT: i32 = 1200;
    pub const ARANGO_DOCUMENT_NOT_FOUND: i32 = 1202;
    pub const ARANGO_DATA_SOURCE_NOT_FOUND: i32 = 1203;
    pub const ARANGO_DUPLICATE_NAME: i32 = 1207;
    pub const ARANGO_UNIQUE_CONSTRAINT_VIOLATED: i32 = 1210;
    pub const ARANGO_DOCUMENT_KEY_BAD: i32 = 1221;
    pub const ARANGO_DOCUMENT_TYPE_INVALID: i32 = 1227;
}

/// Error envelope returned by the server for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    #[serde(default = "default_error_flag")]
    error: bool,
    #[serde(default)]
    code: u16,
    error_num: i32,
    #[serde(default)]
    error_message: String,
}

fn default_error_flag() -> bool {
    true
}

impl ApiErrorResponse {
    /// Build the envelope for a response whose status is outside 2xx.
    ///
    /// Returns `None` (and releases the body) for a successful response. A
    /// body that cannot be read or decoded still yields an envelope carrying
    /// the raw status and a generic message.
    pub async fn from_failed_response(response: HttpResponse) -> Option<Self> {
        if response.is_success() {
            return None;
        }
        Some(Self::read_failure(response).await)
    }

    pub(crate) async fn read_failure(response: HttpResponse) -> Self {
        let status = response.status;
        let bytes = match response.body.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(status, error = %err, "could not read error body");
                return Self::generic(status);
            }
        };
        match serde_json::from_slice::<ApiErrorResponse>(&bytes) {
            Ok(mut envelope) => {
                if envelope.code == 0 {
                    envelope.code = status;
                }
                envelope
            }
            Err(err) => {
                tracing::warn!(status, error = %err, "error body is not an ArangoDB error envelope");
                Self::generic(status)
            }
        }
    }

    fn generic(status: u16) -> Self {
        Self {
            error: true,
            code: status,
            error_num: 0,
            error_message: format!("server responded with HTTP {status} and no readable error body"),
        }
    }

    /// HTTP status of the failed response.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Server-assigned error number, e.g. `codes::ARANGO_DOCUMENT_NOT_FOUND`.
    pub fn error_num(&self) -> i32 {
        self.error_num
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP {} (error {}): {}",
            self.code, self.error_num, self.error_message
        )
    }
}

/// Errors returned by the API clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server reported a failure for the request as a whole.
    #[error("ArangoDB API error: {0}")]
    Api(ApiErrorResponse),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body did not match the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A document handle was not of the form `collection/key`.
    #[error("invalid document handle: {0:?}")]
    InvalidDocumentHandle(String),
}

impl ClientError {
    pub fn api_error(&self) -> Option<&ApiErrorResponse> {
        match self {
            ClientError::Api(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Server error number, when this is an API error.
    pub fn error_num(&self) -> Option<i32> {
        self.api_error().map(ApiErrorResponse::error_num)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
