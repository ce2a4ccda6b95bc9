//! Typed async client for the ArangoDB HTTP API.
//!
//! # Overview
//! Endpoint clients (`DocumentApiClient`, `TransactionApiClient`) turn calls
//! into `HttpRequest`s, hand them to a pluggable `Transport`, and decode the
//! `HttpResponse`s that come back. The transport is the only seam to the
//! network: `HttpTransport` talks to a real server over a pooled reqwest
//! client, `MemoryTransport` serves canned responses in tests.
//!
//! # Design
//! - Single-document calls and transactions are all-or-nothing: any non-2xx
//!   status becomes `ClientError::Api` carrying the server's `errorNum`.
//! - Batch document calls return `DocumentsResponse`, one
//!   `Result<DocumentResponse, DocumentError>` per input item in input
//!   order. A rejected item never fails the call.
//! - Transport failures (`ClientError::Transport`) are never folded into
//!   API errors.
//! - Response bodies are owned streams, released exactly once by whichever
//!   step consumes them.
//!
//! ```no_run
//! use arango_core::{ArangoClient, HttpTransportConfig};
//! use serde_json::{json, Value};
//!
//! # async fn run() -> arango_core::Result<()> {
//! let client = ArangoClient::from_config(HttpTransportConfig::new("http://localhost:8529"))?;
//! let results = client
//!     .document()
//!     .post_documents::<_, Value>("users", &[json!({"name": "Ann"}), json!({"_key": "bad key"})], None)
//!     .await?;
//! for (index, error) in results.errors() {
//!     eprintln!("item {index} rejected: {error}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod document;
pub mod error;
pub mod http;
pub mod serialization;
pub mod transaction;
pub mod transport;

pub use client::{ApiClient, ArangoClient};
pub use document::{
    DeleteDocumentOptions, DocumentApiClient, DocumentError, DocumentResponse, DocumentResult,
    DocumentsResponse, OverwriteMode, PatchDocumentOptions, PostDocumentsOptions,
    PutDocumentOptions,
};
pub use error::{codes, ApiErrorResponse, ClientError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use serialization::SerializationOptions;
pub use transaction::{
    PostTransactionBody, PostTransactionResponse, TransactionApiClient, TransactionCollections,
};
pub use transport::{HttpTransport, HttpTransportConfig, MemoryTransport, Transport, TransportError};
