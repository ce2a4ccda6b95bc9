//! Shared request pipeline and the top-level client.
//!
//! # Design
//! `ApiClient` is the piece every endpoint client composes: it owns the
//! transport handle and the serialization options, encodes request bodies,
//! and turns a response into either a decoded value or a structured
//! `ClientError::Api`. Whether a non-2xx status fails the call is decided
//! here, once; the batch protocol in `document` layers its per-item policy
//! on top of a successful decode.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::document::DocumentApiClient;
use crate::error::{ApiErrorResponse, ClientError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::serialization::{self, SerializationOptions};
use crate::transaction::TransactionApiClient;
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};

/// Transport handle plus encoding/decoding policy, shared by endpoint
/// clients. Cloning shares the transport.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    options: SerializationOptions,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, SerializationOptions::default())
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: SerializationOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn options(&self) -> &SerializationOptions {
        &self.options
    }

    pub fn encode<B: Serialize + ?Sized>(&self, body: &B) -> Result<Bytes> {
        serialization::encode(body, &self.options)
    }

    /// Send a prepared request envelope.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.transport.send(request).await?)
    }

    /// Decode a 2xx body as `T`; fail with `ClientError::Api` otherwise.
    pub async fn expect_success<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T> {
        if response.is_success() {
            return serialization::decode(response.body).await;
        }
        Err(self.failure(response).await)
    }

    /// Like `expect_success` for responses whose body carries nothing of use.
    pub async fn expect_success_empty(&self, response: HttpResponse) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }
        Err(self.failure(response).await)
    }

    pub(crate) async fn failure(&self, response: HttpResponse) -> ClientError {
        let envelope = ApiErrorResponse::read_failure(response).await;
        tracing::debug!(
            code = envelope.code(),
            error_num = envelope.error_num(),
            error_message = envelope.error_message(),
            "request rejected by server"
        );
        ClientError::Api(envelope)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Entry point: one client per server/database, exposing the endpoint
/// clients that share its transport.
#[derive(Debug, Clone)]
pub struct ArangoClient {
    document: DocumentApiClient,
    transaction: TransactionApiClient,
}

impl ArangoClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::from_api(ApiClient::new(transport))
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: SerializationOptions) -> Self {
        Self::from_api(ApiClient::with_options(transport, options))
    }

    /// Connect through a pooled `HttpTransport`.
    pub fn from_config(config: HttpTransportConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    fn from_api(api: ApiClient) -> Self {
        Self {
            document: DocumentApiClient::new(api.clone()),
            transaction: TransactionApiClient::new(api),
        }
    }

    pub fn document(&self) -> &DocumentApiClient {
        &self.document
    }

    pub fn transaction(&self) -> &TransactionApiClient {
        &self.transaction
    }
}
