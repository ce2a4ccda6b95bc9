//! Document API client (`_api/document`).
//!
//! # Design
//! Single-document calls follow the all-or-nothing policy: a non-2xx status
//! becomes `ClientError::Api`. Batch calls (`*_documents`) send the whole
//! sequence in one request; a 2xx response is decoded into a
//! `DocumentsResponse` whose element `i` belongs to input item `i`, and
//! individual failures stay inside that sequence. Only a non-2xx status
//! (bad request, unknown collection, ...) fails a batch call as a whole.

mod models;

use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MATCH};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::{ClientError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::serialization::{decode_slice, encode_path_segment, QueryParams};

pub use models::{
    DeleteDocumentOptions, DocumentError, DocumentResponse, DocumentResult, DocumentsResponse,
    OverwriteMode, PatchDocumentOptions, PostDocumentsOptions, PutDocumentOptions,
};

const DOCUMENT_API_PATH: &str = "_api/document";

/// Client for creating, reading, replacing, updating and removing documents.
#[derive(Debug, Clone)]
pub struct DocumentApiClient {
    api: ApiClient,
}

impl DocumentApiClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Create one document in `collection`.
    pub async fn post_document<T, U>(
        &self,
        collection: &str,
        document: &T,
        options: Option<&PostDocumentsOptions>,
    ) -> Result<DocumentResponse<U>>
    where
        T: Serialize + ?Sized,
        U: DeserializeOwned,
    {
        let path = collection_path(collection, options.map(PostDocumentsOptions::to_query));
        let body = self.api.encode(document)?;
        let response = self.api.transport().post(&path, body).await?;
        self.single(response).await
    }

    /// Create several documents in one request.
    ///
    /// Does not fail when individual documents are rejected; check each
    /// element of the result. An empty input returns an empty result
    /// without contacting the server.
    pub async fn post_documents<T, U>(
        &self,
        collection: &str,
        documents: &[T],
        options: Option<&PostDocumentsOptions>,
    ) -> Result<DocumentsResponse<U>>
    where
        T: Serialize,
        U: DeserializeOwned,
    {
        if documents.is_empty() {
            return Ok(DocumentsResponse::default());
        }
        let path = collection_path(collection, options.map(PostDocumentsOptions::to_query));
        let body = self.api.encode(documents)?;
        let response = self.api.transport().post(&path, body).await?;
        self.batch(response, documents.len()).await
    }

    /// Create several documents with `silent=true`.
    ///
    /// The server omits the descriptors of successful items, so only the
    /// failures come back, without their input positions.
    pub async fn post_documents_silent<T>(
        &self,
        collection: &str,
        documents: &[T],
        options: Option<&PostDocumentsOptions>,
    ) -> Result<Vec<DocumentError>>
    where
        T: Serialize,
    {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = options
            .map(PostDocumentsOptions::to_query)
            .unwrap_or_default();
        query.push("silent", true);
        let path = collection_path(collection, Some(query));
        let body = self.api.encode(documents)?;
        let response = self.api.transport().post(&path, body).await?;

        let raw: Value = self.api.expect_success(response).await?;
        match raw {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value::<DocumentError>(item)
                        .map_err(|e| ClientError::Deserialization(e.to_string()))
                })
                .collect(),
            Value::Object(_) => Ok(Vec::new()),
            other => Err(ClientError::Deserialization(format!(
                "unexpected silent batch response: {other}"
            ))),
        }
    }

    /// Replace the document identified by `handle` (`collection/key`).
    ///
    /// On success the returned `rev` differs from the one replaced.
    pub async fn put_document<T, U>(
        &self,
        handle: &str,
        document: &T,
        options: Option<&PutDocumentOptions>,
    ) -> Result<DocumentResponse<U>>
    where
        T: Serialize + ?Sized,
        U: DeserializeOwned,
    {
        let query = options.map(PutDocumentOptions::to_query);
        let path = handle_path(handle, query)?;
        let request = HttpRequest::new(HttpMethod::Put, path)
            .with_body(self.api.encode(document)?)
            .with_headers(if_match(options.and_then(|o| o.if_match.as_deref()))?);
        let response = self.api.execute(request).await?;
        self.single(response).await
    }

    /// Replace several documents; each must carry its `_key`.
    pub async fn put_documents<T, U>(
        &self,
        collection: &str,
        documents: &[T],
        options: Option<&PutDocumentOptions>,
    ) -> Result<DocumentsResponse<U>>
    where
        T: Serialize,
        U: DeserializeOwned,
    {
        if documents.is_empty() {
            return Ok(DocumentsResponse::default());
        }
        let path = collection_path(collection, options.map(PutDocumentOptions::to_query));
        let body = self.api.encode(documents)?;
        let response = self.api.transport().put(&path, body).await?;
        self.batch(response, documents.len()).await
    }

    /// Partially update the document identified by `handle`.
    pub async fn patch_document<T, U>(
        &self,
        handle: &str,
        patch: &T,
        options: Option<&PatchDocumentOptions>,
    ) -> Result<DocumentResponse<U>>
    where
        T: Serialize + ?Sized,
        U: DeserializeOwned,
    {
        let query = options.map(PatchDocumentOptions::to_query);
        let path = handle_path(handle, query)?;
        let request = HttpRequest::new(HttpMethod::Patch, path)
            .with_body(self.api.encode(patch)?)
            .with_headers(if_match(options.and_then(|o| o.if_match.as_deref()))?);
        let response = self.api.execute(request).await?;
        self.single(response).await
    }

    /// Partially update several documents; each patch must carry its `_key`.
    pub async fn patch_documents<T, U>(
        &self,
        collection: &str,
        patches: &[T],
        options: Option<&PatchDocumentOptions>,
    ) -> Result<DocumentsResponse<U>>
    where
        T: Serialize,
        U: DeserializeOwned,
    {
        if patches.is_empty() {
            return Ok(DocumentsResponse::default());
        }
        let path = collection_path(collection, options.map(PatchDocumentOptions::to_query));
        let body = self.api.encode(patches)?;
        let response = self.api.transport().patch(&path, body).await?;
        self.batch(response, patches.len()).await
    }

    /// Fetch the document identified by `handle`.
    pub async fn get_document<T: DeserializeOwned>(&self, handle: &str) -> Result<T> {
        let path = handle_path(handle, None)?;
        let response = self.api.transport().get(&path).await?;
        self.api.expect_success(response).await
    }

    /// Current revision of a document, read with a HEAD request.
    pub async fn get_document_rev(&self, handle: &str) -> Result<String> {
        let path = handle_path(handle, None)?;
        let response = self.api.transport().head(&path, HeaderMap::new()).await?;
        if !response.is_success() {
            return Err(self.api.failure(response).await);
        }
        response
            .header(ETAG.as_str())
            .map(|etag| etag.trim_matches('"').to_string())
            .filter(|rev| !rev.is_empty())
            .ok_or_else(|| ClientError::Deserialization("response has no ETag header".to_string()))
    }

    /// Remove the document identified by `handle`.
    pub async fn delete_document<U: DeserializeOwned>(
        &self,
        handle: &str,
        options: Option<&DeleteDocumentOptions>,
    ) -> Result<DocumentResponse<U>> {
        let query = options.map(DeleteDocumentOptions::to_query);
        let path = handle_path(handle, query)?;
        let request = HttpRequest::new(HttpMethod::Delete, path)
            .with_headers(if_match(options.and_then(|o| o.if_match.as_deref()))?);
        let response = self.api.execute(request).await?;
        self.single(response).await
    }

    /// Remove several documents, given as keys or as objects with `_key`.
    pub async fn delete_documents<K, U>(
        &self,
        collection: &str,
        selectors: &[K],
        options: Option<&DeleteDocumentOptions>,
    ) -> Result<DocumentsResponse<U>>
    where
        K: Serialize,
        U: DeserializeOwned,
    {
        if selectors.is_empty() {
            return Ok(DocumentsResponse::default());
        }
        let path = collection_path(collection, options.map(DeleteDocumentOptions::to_query));
        let body = self.api.encode(selectors)?;
        let response = self.api.transport().delete_with_body(&path, body).await?;
        self.batch(response, selectors.len()).await
    }

    async fn single<U: DeserializeOwned>(&self, response: HttpResponse) -> Result<DocumentResponse<U>> {
        self.api
            .expect_success::<DocumentResponse<U>>(response)
            .await?
            .validated()
    }

    /// Decode a batch response, failing only on a whole-batch error or when
    /// the server's answer does not line up with the input.
    async fn batch<U: DeserializeOwned>(
        &self,
        response: HttpResponse,
        expected: usize,
    ) -> Result<DocumentsResponse<U>> {
        if !response.is_success() {
            return Err(self.api.failure(response).await);
        }
        let bytes = response.body.bytes().await?;
        let results: DocumentsResponse<U> = decode_slice(&bytes)?;
        if results.len() != expected {
            return Err(ClientError::Deserialization(format!(
                "batch of {expected} documents answered with {} results",
                results.len()
            )));
        }
        let failed = results.errors().count();
        if failed > 0 {
            tracing::debug!(total = expected, failed, "batch completed with item errors");
        }
        Ok(results)
    }
}

fn collection_path(collection: &str, query: Option<QueryParams>) -> String {
    let path = format!("{DOCUMENT_API_PATH}/{}", encode_path_segment(collection));
    query.unwrap_or_default().apply(&path)
}

fn handle_path(handle: &str, query: Option<QueryParams>) -> Result<String> {
    let (collection, key) = handle
        .split_once('/')
        .filter(|(collection, key)| !collection.is_empty() && !key.is_empty() && !key.contains('/'))
        .ok_or_else(|| ClientError::InvalidDocumentHandle(handle.to_string()))?;
    let path = format!(
        "{DOCUMENT_API_PATH}/{}/{}",
        encode_path_segment(collection),
        encode_path_segment(key)
    );
    Ok(query.unwrap_or_default().apply(&path))
}

fn if_match(rev: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(rev) = rev {
        let value = HeaderValue::from_str(&format!("\"{rev}\""))
            .map_err(|e| ClientError::Serialization(format!("invalid revision {rev:?}: {e}")))?;
        headers.insert(IF_MATCH, value);
    }
    Ok(headers)
}
