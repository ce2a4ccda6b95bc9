use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

pub const ERROR_BAD_PARAMETER: i32 = 10;
pub const ERROR_HTTP_CORRUPTED_JSON: i32 = 600;
pub const ERROR_ARANGO_CONFLICT: i32 = 1200;
pub const ERROR_ARANGO_DOCUMENT_NOT_FOUND: i32 = 1202;
pub const ERROR_ARANGO_DATA_SOURCE_NOT_FOUND: i32 = 1203;
pub const ERROR_ARANGO_DUPLICATE_NAME: i32 = 1207;
pub const ERROR_ARANGO_UNIQUE_CONSTRAINT_VIOLATED: i32 = 1210;
pub const ERROR_ARANGO_DOCUMENT_KEY_BAD: i32 = 1221;
pub const ERROR_ARANGO_DOCUMENT_TYPE_INVALID: i32 = 1227;
pub const ERROR_ARANGO_DOCUMENT_KEY_MISSING: i32 = 1233;

/// A server-side failure, rendered as ArangoDB's error envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ArangoError {
    pub status: StatusCode,
    pub error_num: i32,
    pub message: String,
}

impl ArangoError {
    pub fn new(status: StatusCode, error_num: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            error_num,
            message: message.into(),
        }
    }

    pub fn collection_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ERROR_ARANGO_DATA_SOURCE_NOT_FOUND,
            "collection or view not found",
        )
    }

    pub fn document_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ERROR_ARANGO_DOCUMENT_NOT_FOUND,
            "document not found",
        )
    }

    pub fn bad_key() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ERROR_ARANGO_DOCUMENT_KEY_BAD,
            "illegal document key",
        )
    }

    pub fn missing_key() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ERROR_ARANGO_DOCUMENT_KEY_MISSING,
            "missing document key",
        )
    }

    pub fn unique_violation(key: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            ERROR_ARANGO_UNIQUE_CONSTRAINT_VIOLATED,
            format!(
                "unique constraint violated - in index primary of type primary over '_key'; conflicting key: {key}"
            ),
        )
    }

    pub fn invalid_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ERROR_ARANGO_DOCUMENT_TYPE_INVALID,
            "invalid document type",
        )
    }

    pub fn rev_conflict() -> Self {
        Self::new(
            StatusCode::PRECONDITION_FAILED,
            ERROR_ARANGO_CONFLICT,
            "conflict, _rev values do not match",
        )
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            ERROR_ARANGO_DUPLICATE_NAME,
            format!("duplicate name: {name}"),
        )
    }

    pub fn corrupted_json(detail: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ERROR_HTTP_CORRUPTED_JSON,
            format!("VPackError error: {detail}"),
        )
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ERROR_BAD_PARAMETER, message)
    }

    /// Per-item form used inside batch responses.
    pub fn item(&self) -> Value {
        json!({
            "error": true,
            "errorNum": self.error_num,
            "errorMessage": self.message,
        })
    }
}

impl IntoResponse for ArangoError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "code": self.status.as_u16(),
            "errorNum": self.error_num,
            "errorMessage": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
