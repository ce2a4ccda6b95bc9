//! A small in-process stand-in for the ArangoDB document and transaction
//! endpoints, used by the client's integration tests.

pub mod error;
pub mod store;

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        header::{ETAG, IF_MATCH},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub use error::ArangoError;
pub use store::{DocumentQuery, Mutation, Store};

/// Header carrying per-errorNum failure counts of a batch.
pub const ERROR_CODES_HEADER: HeaderName = HeaderName::from_static("x-arango-error-codes");

pub type Db = Arc<RwLock<Store>>;

#[derive(Deserialize)]
struct CollectionPath {
    collection: String,
}

#[derive(Deserialize)]
struct DocumentPath {
    collection: String,
    key: String,
}

#[derive(Deserialize)]
struct CreateCollection {
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CollectionList {
    One(String),
    Many(Vec<String>),
}

impl Default for CollectionList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl CollectionList {
    fn names(&self) -> &[String] {
        match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }
}

#[derive(Default, Deserialize)]
struct TransactionCollections {
    #[serde(default)]
    read: CollectionList,
    #[serde(default)]
    write: CollectionList,
    #[serde(default)]
    exclusive: CollectionList,
}

#[derive(Deserialize)]
struct TransactionRequest {
    #[serde(default)]
    collections: TransactionCollections,
    action: Option<Value>,
    #[serde(default)]
    params: Value,
}

pub fn app() -> Router {
    app_with_collections(&[])
}

/// Router with the given collections created up front. Routes are served
/// both at the root and under `/_db/{database}`.
pub fn app_with_collections(collections: &[&str]) -> Router {
    let db: Db = Arc::new(RwLock::new(Store::with_collections(collections)));
    let api = Router::new()
        .route("/_api/collection", post(create_collection))
        .route(
            "/_api/document/{collection}",
            post(post_documents)
                .put(put_documents)
                .patch(patch_documents)
                .delete(delete_documents),
        )
        .route(
            "/_api/document/{collection}/{key}",
            get(get_document)
                .head(head_document)
                .put(put_document)
                .patch(patch_document)
                .delete(delete_document),
        )
        .route("/_api/transaction", post(post_transaction));
    Router::new()
        .nest("/_db/{database}", api.clone())
        .merge(api)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_collections(
    listener: TcpListener,
    collections: &[&str],
) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_collections(collections)).await
}

fn parse_body(body: &Bytes) -> Result<Value, ArangoError> {
    serde_json::from_slice(body).map_err(ArangoError::corrupted_json)
}

fn if_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IF_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_matches('"').to_string())
}

fn write_status(query: &DocumentQuery) -> StatusCode {
    if query.wait_for_sync == Some(true) {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    }
}

fn remove_status(query: &DocumentQuery) -> StatusCode {
    if query.wait_for_sync == Some(true) {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    }
}

fn etag(document: &Value) -> Option<HeaderValue> {
    let rev = document["_rev"].as_str()?;
    HeaderValue::from_str(&format!("\"{rev}\"")).ok()
}

fn single_response(status: StatusCode, query: &DocumentQuery, descriptor: Value) -> Response {
    let tag = etag(&descriptor);
    let body = if query.silent == Some(true) {
        json!({})
    } else {
        descriptor
    };
    let mut response = (status, Json(body)).into_response();
    if let Some(tag) = tag {
        response.headers_mut().insert(ETAG, tag);
    }
    response
}

/// Render per-item outcomes in input order. With `silent=true` only the
/// failures are returned.
fn batch_response(
    status: StatusCode,
    query: &DocumentQuery,
    results: Vec<Result<Value, ArangoError>>,
) -> Response {
    let silent = query.silent == Some(true);
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let items: Vec<Value> = results
        .into_iter()
        .filter_map(|result| match result {
            Ok(descriptor) => (!silent).then_some(descriptor),
            Err(err) => {
                *counts.entry(err.error_num.to_string()).or_default() += 1;
                Some(err.item())
            }
        })
        .collect();

    let mut response = (status, Json(Value::Array(items))).into_response();
    if !counts.is_empty() {
        let encoded = serde_json::to_string(&counts).unwrap_or_default();
        if let Ok(value) = HeaderValue::from_str(&encoded) {
            response.headers_mut().insert(ERROR_CODES_HEADER, value);
        }
    }
    response
}

async fn create_collection(State(db): State<Db>, body: Bytes) -> Result<Response, ArangoError> {
    let input: CreateCollection = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| ArangoError::bad_parameter(e.to_string()))?;
    let name = input
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ArangoError::bad_parameter("expecting a collection name"))?;

    if !db.write().await.create_collection(&name) {
        return Err(ArangoError::duplicate_name(&name));
    }
    tracing::debug!(collection = %name, "collection created");
    Ok((
        StatusCode::OK,
        Json(json!({"error": false, "code": 200, "name": name, "type": 2, "status": 3})),
    )
        .into_response())
}

async fn post_documents(
    State(db): State<Db>,
    Path(path): Path<CollectionPath>,
    Query(query): Query<DocumentQuery>,
    body: Bytes,
) -> Result<Response, ArangoError> {
    let payload = parse_body(&body)?;
    let mut store = db.write().await;
    if !store.has_collection(&path.collection) {
        return Err(ArangoError::collection_not_found());
    }
    let status = write_status(&query);
    match payload {
        Value::Array(items) => {
            tracing::debug!(collection = %path.collection, items = items.len(), "batch insert");
            let results = items
                .into_iter()
                .map(|item| store.insert(&path.collection, item, &query))
                .collect();
            Ok(batch_response(status, &query, results))
        }
        document => {
            let descriptor = store.insert(&path.collection, document, &query)?;
            Ok(single_response(status, &query, descriptor))
        }
    }
}

async fn modify_many(
    db: Db,
    collection: String,
    query: DocumentQuery,
    headers: HeaderMap,
    body: Bytes,
    mutation: Mutation,
) -> Result<Response, ArangoError> {
    let payload = parse_body(&body)?;
    let mut store = db.write().await;
    if !store.has_collection(&collection) {
        return Err(ArangoError::collection_not_found());
    }
    let status = write_status(&query);
    match payload {
        Value::Array(items) => {
            tracing::debug!(%collection, items = items.len(), ?mutation, "batch modify");
            let results = items
                .into_iter()
                .map(|item| store.modify(&collection, None, item, &query, None, mutation))
                .collect();
            Ok(batch_response(status, &query, results))
        }
        document => {
            let expected = if_match(&headers);
            let descriptor =
                store.modify(&collection, None, document, &query, expected.as_deref(), mutation)?;
            Ok(single_response(status, &query, descriptor))
        }
    }
}

async fn put_documents(
    State(db): State<Db>,
    Path(path): Path<CollectionPath>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ArangoError> {
    modify_many(db, path.collection, query, headers, body, Mutation::Replace).await
}

async fn patch_documents(
    State(db): State<Db>,
    Path(path): Path<CollectionPath>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ArangoError> {
    modify_many(db, path.collection, query, headers, body, Mutation::Update).await
}

async fn delete_documents(
    State(db): State<Db>,
    Path(path): Path<CollectionPath>,
    Query(query): Query<DocumentQuery>,
    body: Bytes,
) -> Result<Response, ArangoError> {
    let payload = parse_body(&body)?;
    let Value::Array(selectors) = payload else {
        return Err(ArangoError::bad_parameter("expecting array of document selectors"));
    };
    let mut store = db.write().await;
    if !store.has_collection(&path.collection) {
        return Err(ArangoError::collection_not_found());
    }
    let results = selectors
        .iter()
        .map(|selector| store.remove(&path.collection, selector, &query, None))
        .collect();
    Ok(batch_response(remove_status(&query), &query, results))
}

async fn get_document(
    State(db): State<Db>,
    Path(path): Path<DocumentPath>,
    headers: HeaderMap,
) -> Result<Response, ArangoError> {
    let store = db.read().await;
    let document = store.get(&path.collection, &path.key)?;
    if let Some(expected) = if_match(&headers) {
        if document["_rev"].as_str() != Some(expected.as_str()) {
            return Err(ArangoError::rev_conflict());
        }
    }
    Ok(single_response(StatusCode::OK, &DocumentQuery::default(), document.clone()))
}

async fn head_document(
    State(db): State<Db>,
    Path(path): Path<DocumentPath>,
) -> Response {
    let store = db.read().await;
    match store.get(&path.collection, &path.key) {
        Ok(document) => match etag(document) {
            Some(tag) => (StatusCode::OK, [(ETAG, tag)]).into_response(),
            None => StatusCode::OK.into_response(),
        },
        Err(err) => err.status.into_response(),
    }
}

async fn put_document(
    State(db): State<Db>,
    Path(path): Path<DocumentPath>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ArangoError> {
    modify_one(db, path, query, headers, body, Mutation::Replace).await
}

async fn patch_document(
    State(db): State<Db>,
    Path(path): Path<DocumentPath>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ArangoError> {
    modify_one(db, path, query, headers, body, Mutation::Update).await
}

async fn modify_one(
    db: Db,
    path: DocumentPath,
    query: DocumentQuery,
    headers: HeaderMap,
    body: Bytes,
    mutation: Mutation,
) -> Result<Response, ArangoError> {
    let document = parse_body(&body)?;
    let expected = if_match(&headers);
    let descriptor = db.write().await.modify(
        &path.collection,
        Some(&path.key),
        document,
        &query,
        expected.as_deref(),
        mutation,
    )?;
    Ok(single_response(write_status(&query), &query, descriptor))
}

async fn delete_document(
    State(db): State<Db>,
    Path(path): Path<DocumentPath>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
) -> Result<Response, ArangoError> {
    let expected = if_match(&headers);
    let descriptor = db.write().await.remove(
        &path.collection,
        &Value::String(path.key),
        &query,
        expected.as_deref(),
    )?;
    Ok(single_response(remove_status(&query), &query, descriptor))
}

fn looks_like_function(action: &str) -> bool {
    let action = action.trim();
    action.starts_with("function") || action.contains("=>")
}

/// Validate the declared collections and echo `params` back as the result.
/// The action itself is never executed.
async fn post_transaction(State(db): State<Db>, body: Bytes) -> Result<Response, ArangoError> {
    let request: TransactionRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|e| ArangoError::bad_parameter(e.to_string()))?;

    let action = match &request.action {
        Some(Value::String(action)) if !action.trim().is_empty() => action,
        _ => {
            return Err(ArangoError::bad_parameter(
                "missing/invalid action definition for transaction",
            ))
        }
    };
    if !looks_like_function(action) {
        return Err(ArangoError::bad_parameter(
            "could not compile transaction action",
        ));
    }

    let store = db.read().await;
    let declared = &request.collections;
    for name in declared
        .read
        .names()
        .iter()
        .chain(declared.write.names())
        .chain(declared.exclusive.names())
    {
        if !store.has_collection(name) {
            tracing::debug!(collection = %name, "transaction references unknown collection");
            return Err(ArangoError::collection_not_found());
        }
    }

    Ok((
        StatusCode::OK,
        Json(json!({"error": false, "code": 200, "result": request.params})),
    )
        .into_response())
}
