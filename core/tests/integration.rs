//! Document and transaction calls against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and talks to it through
//! `HttpTransport`, so request building, the pooled reqwest transport and
//! response decoding are all exercised over real HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use arango_core::{
    codes, ApiErrorResponse, ArangoClient, ClientError, DeleteDocumentOptions, HttpTransport,
    HttpTransportConfig, OverwriteMode, PatchDocumentOptions, PostDocumentsOptions,
    PostTransactionBody, PutDocumentOptions, Transport,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const COLLECTION: &str = "TestCollection";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestDoc {
    test: i64,
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// Create the test collection, tolerating "duplicate name".
async fn ensure_collection(transport: &HttpTransport, name: &str) {
    let body = serde_json::to_vec(&json!({ "name": name })).unwrap();
    let response = transport.post("_api/collection", body.into()).await.unwrap();
    if let Some(err) = ApiErrorResponse::from_failed_response(response).await {
        assert_eq!(err.error_num(), codes::ARANGO_DUPLICATE_NAME, "{err}");
    }
}

async fn setup() -> (Arc<HttpTransport>, ArangoClient) {
    let addr = start_server();
    let transport = Arc::new(HttpTransport::new(HttpTransportConfig::new(format!("http://{addr}"))).unwrap());
    ensure_collection(&transport, COLLECTION).await;
    ensure_collection(&transport, COLLECTION).await;
    let client = ArangoClient::new(transport.clone());
    (transport, client)
}

fn handle(key: &str) -> String {
    format!("{COLLECTION}/{key}")
}

#[tokio::test]
async fn post_document_returns_descriptor_without_new_or_old() {
    let (_, client) = setup().await;

    let created = client
        .document()
        .post_document::<_, Value>(COLLECTION, &TestDoc { test: 1 }, None)
        .await
        .unwrap();

    assert!(!created.id.is_empty());
    assert!(!created.key.is_empty());
    assert!(!created.rev.is_empty());
    assert_eq!(created.id, handle(&created.key));
    assert!(created.new.is_none());
    assert!(created.old.is_none());
}

#[tokio::test]
async fn post_document_return_new() {
    let (_, client) = setup().await;
    let options = PostDocumentsOptions {
        return_new: Some(true),
        ..Default::default()
    };

    let created = client
        .document()
        .post_document::<_, TestDoc>(COLLECTION, &TestDoc { test: 123 }, Some(&options))
        .await
        .unwrap();

    assert_eq!(created.new, Some(TestDoc { test: 123 }));
    assert!(created.old.is_none());
}

#[tokio::test]
async fn post_document_invalid_key_is_an_api_error() {
    let (_, client) = setup().await;

    let err = client
        .document()
        .post_document::<_, Value>(COLLECTION, &json!({"_key": "Spaces are not allowed in keys"}), None)
        .await
        .unwrap_err();

    let api = err.api_error().expect("expected an API error");
    assert_eq!(api.code(), 400);
    assert_eq!(api.error_num(), codes::ARANGO_DOCUMENT_KEY_BAD);
    assert!(!api.error_message().is_empty());
}

#[tokio::test]
async fn post_document_duplicate_key() {
    let (_, client) = setup().await;
    let doc = json!({"_key": "dup", "test": 1});
    client
        .document()
        .post_document::<_, Value>(COLLECTION, &doc, None)
        .await
        .unwrap();

    let err = client
        .document()
        .post_document::<_, Value>(COLLECTION, &doc, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_num(), Some(codes::ARANGO_UNIQUE_CONSTRAINT_VIOLATED));

    let options = PostDocumentsOptions {
        overwrite_mode: Some(OverwriteMode::Replace),
        return_old: Some(true),
        ..Default::default()
    };
    let replaced = client
        .document()
        .post_document::<_, Value>(COLLECTION, &json!({"_key": "dup", "test": 2}), Some(&options))
        .await
        .unwrap();
    assert_eq!(replaced.old.unwrap()["test"], 1);
    assert!(replaced.old_rev.is_some());
}

#[tokio::test]
async fn post_documents_reports_each_item() {
    let (_, client) = setup().await;
    let docs = vec![
        json!({"_key": "Spaces are not allowed in keys"}),
        json!({"test": 1}),
    ];

    let results = client
        .document()
        .post_documents::<_, Value>(COLLECTION, &docs, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let err = results[0].as_ref().unwrap_err();
    assert_eq!(err.error_num, codes::ARANGO_DOCUMENT_KEY_BAD);
    assert!(!err.error_message.is_empty());
    let ok = results[1].as_ref().unwrap();
    assert!(!ok.rev.is_empty());
    assert!(results.has_errors());
}

#[tokio::test]
async fn post_documents_valid_then_invalid() {
    let (_, client) = setup().await;
    let docs = vec![
        json!({"test": 1}),
        json!({"_key": "Spaces are not allowed in keys"}),
    ];

    let results = client
        .document()
        .post_documents::<_, Value>(COLLECTION, &docs, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let ok = results[0].as_ref().unwrap();
    assert!(!ok.key.is_empty());
    assert!(!ok.rev.is_empty());
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.error_num, codes::ARANGO_DOCUMENT_KEY_BAD);
    assert!(results.has_errors());
}

#[tokio::test]
async fn post_documents_silent_returns_only_failures() {
    let (_, client) = setup().await;
    let docs = vec![json!({"a": 1}), json!({"_key": "not ok"}), json!({"b": 2})];

    let failures = client
        .document()
        .post_documents_silent(COLLECTION, &docs, None)
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_num, codes::ARANGO_DOCUMENT_KEY_BAD);
}

#[tokio::test]
async fn empty_batches_succeed_without_a_request() {
    let (_, client) = setup().await;
    let none: Vec<Value> = Vec::new();
    let docs = client.document();

    assert!(docs.post_documents::<_, Value>(COLLECTION, &none, None).await.unwrap().is_empty());
    assert!(docs.put_documents::<_, Value>(COLLECTION, &none, None).await.unwrap().is_empty());
    assert!(docs.patch_documents::<_, Value>(COLLECTION, &none, None).await.unwrap().is_empty());
    assert!(docs.delete_documents::<_, Value>(COLLECTION, &none, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn put_document_changes_rev() {
    let (_, client) = setup().await;
    let docs = client.document();
    let created = docs
        .post_document::<_, Value>(COLLECTION, &json!({"stuff": "test"}), None)
        .await
        .unwrap();

    let options = PutDocumentOptions {
        if_match: Some(created.rev.clone()),
        return_new: Some(true),
        ..Default::default()
    };
    let replaced = docs
        .put_document::<_, Value>(&created.id, &json!({"stuff": "new"}), Some(&options))
        .await
        .unwrap();

    assert_eq!(replaced.id, created.id);
    assert_eq!(replaced.key, created.key);
    assert_ne!(replaced.rev, created.rev);
    assert_eq!(replaced.old_rev.as_deref(), Some(created.rev.as_str()));
    assert_eq!(replaced.new.unwrap()["stuff"], "new");

    let stale = docs
        .put_document::<_, Value>(&created.id, &json!({}), Some(&options))
        .await
        .unwrap_err();
    assert_eq!(stale.error_num(), Some(codes::ARANGO_CONFLICT));
}

#[tokio::test]
async fn put_documents_changes_revs() {
    let (_, client) = setup().await;
    let docs = client.document();
    let keys: Vec<String> = (0..2).map(|_| uuid::Uuid::new_v4().simple().to_string()).collect();
    let originals: Vec<Value> = keys.iter().map(|key| json!({"_key": key, "value": 1})).collect();
    let created = docs
        .post_documents::<_, Value>(COLLECTION, &originals, None)
        .await
        .unwrap();

    let replacements: Vec<Value> = keys.iter().map(|key| json!({"_key": key, "value": 2})).collect();
    let replaced = docs
        .put_documents::<_, Value>(COLLECTION, &replacements, None)
        .await
        .unwrap();

    assert_eq!(replaced.len(), 2);
    for (before, after) in created.iter().zip(replaced.iter()) {
        let before = before.as_ref().unwrap();
        let after = after.as_ref().unwrap();
        assert_eq!(before.key, after.key);
        assert_ne!(before.rev, after.rev);
    }
}

#[tokio::test]
async fn patch_get_and_delete_lifecycle() {
    let (_, client) = setup().await;
    let docs = client.document();
    let created = docs
        .post_document::<_, Value>(COLLECTION, &json!({"_key": "life", "a": 1, "b": 2}), None)
        .await
        .unwrap();

    let rev = docs.get_document_rev(&created.id).await.unwrap();
    assert_eq!(rev, created.rev);

    let options = PatchDocumentOptions {
        keep_null: Some(false),
        return_new: Some(true),
        ..Default::default()
    };
    let patched = docs
        .patch_document::<_, Value>(&created.id, &json!({"a": null, "c": 3}), Some(&options))
        .await
        .unwrap();
    let new = patched.new.unwrap();
    assert!(new.get("a").is_none());
    assert_eq!(new["b"], 2);
    assert_eq!(new["c"], 3);

    let fetched: Value = docs.get_document(&created.id).await.unwrap();
    assert_eq!(fetched["_rev"], patched.rev.as_str());

    let options = DeleteDocumentOptions {
        return_old: Some(true),
        ..Default::default()
    };
    let removed = docs
        .delete_document::<Value>(&created.id, Some(&options))
        .await
        .unwrap();
    assert_eq!(removed.old.unwrap()["c"], 3);

    let missing = docs.get_document::<Value>(&created.id).await.unwrap_err();
    assert_eq!(missing.error_num(), Some(codes::ARANGO_DOCUMENT_NOT_FOUND));
    let missing = docs.get_document_rev(&created.id).await.unwrap_err();
    assert_eq!(missing.api_error().map(|api| api.code()), Some(404));
}

#[tokio::test]
async fn patch_and_delete_batches() {
    let (_, client) = setup().await;
    let docs = client.document();
    docs.post_documents::<_, Value>(
        COLLECTION,
        &[json!({"_key": "p1", "n": 1}), json!({"_key": "p2", "n": 1})],
        None,
    )
    .await
    .unwrap();

    let patched = docs
        .patch_documents::<_, Value>(
            COLLECTION,
            &[json!({"_key": "p1", "m": 2}), json!({"_key": "gone", "m": 2})],
            None,
        )
        .await
        .unwrap();
    assert!(patched[0].is_ok());
    assert_eq!(
        patched[1].as_ref().unwrap_err().error_num,
        codes::ARANGO_DOCUMENT_NOT_FOUND
    );

    let removed = docs
        .delete_documents::<_, Value>(COLLECTION, &["p1", "p2"], None)
        .await
        .unwrap();
    assert_eq!(removed.successes().count(), 2);
}

#[tokio::test]
async fn unknown_collection_fails_the_whole_batch() {
    let (_, client) = setup().await;
    let err = client
        .document()
        .post_documents::<_, Value>("missing", &[json!({}), json!({})], None)
        .await
        .unwrap_err();
    assert_eq!(err.error_num(), Some(codes::ARANGO_DATA_SOURCE_NOT_FOUND));
}

#[tokio::test]
async fn invalid_handle_is_rejected_before_sending() {
    let (_, client) = setup().await;
    let err = client.document().get_document::<Value>("no-slash").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidDocumentHandle(_)));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    value: i64,
}

#[tokio::test]
async fn transaction_returns_typed_result() {
    let (_, client) = setup().await;
    let body = PostTransactionBody::new("function (params) { return params; }")
        .write(COLLECTION)
        .params(json!({"value": 7}));

    let response = client.transaction().post_transaction::<Echo>(&body).await.unwrap();

    assert!(!response.error);
    assert_eq!(response.code, 200);
    assert_eq!(response.result, Echo { value: 7 });
}

#[tokio::test]
async fn transaction_on_missing_collection_fails() {
    let (_, client) = setup().await;
    let body = PostTransactionBody::new("function () { return 1; }").read("NoSuchCollection");

    let err = client
        .transaction()
        .post_transaction::<Value>(&body)
        .await
        .unwrap_err();

    let api = err.api_error().expect("expected an API error");
    assert_eq!(api.code(), 404);
    assert_eq!(api.error_num(), codes::ARANGO_DATA_SOURCE_NOT_FOUND);
}

#[tokio::test]
async fn database_scoped_transport() {
    let addr = start_server();
    let config = HttpTransportConfig::new(format!("http://{addr}")).database("_system");
    let transport = Arc::new(HttpTransport::new(config).unwrap());
    ensure_collection(&transport, COLLECTION).await;
    let client = ArangoClient::new(transport);

    let created = client
        .document()
        .post_document::<_, Value>(COLLECTION, &json!({"test": 1}), None)
        .await
        .unwrap();
    assert!(!created.rev.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_share_one_client() {
    let (_, client) = setup().await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .document()
                    .post_document::<_, TestDoc>(COLLECTION, &TestDoc { test: i }, None)
                    .await
            })
        })
        .collect();

    let mut keys = Vec::new();
    for task in tasks {
        keys.push(task.await.unwrap().unwrap().key);
    }
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 16);
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = unused.local_addr().unwrap();
    drop(unused);

    let client = ArangoClient::from_config(HttpTransportConfig::new(format!("http://{addr}"))).unwrap();
    let err = client
        .document()
        .post_document::<_, Value>(COLLECTION, &json!({}), None)
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(err.api_error().is_none());
}

#[tokio::test]
async fn closed_transport_is_a_transport_error() {
    let (transport, client) = setup().await;
    transport.close();
    let err = client
        .transaction()
        .post_transaction::<Value>(&PostTransactionBody::new("function () {}"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
}
