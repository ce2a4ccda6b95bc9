//! Request options and response shapes of the document API.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::serialization::QueryParams;

/// Metadata of a created, replaced, updated or removed document.
///
/// `new` and `old` are only present when requested through the options
/// (`return_new` / `return_old`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResponse<T = Value> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_oldRev", default, skip_serializing_if = "Option::is_none")]
    pub old_rev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<T>,
}

impl<T> DocumentResponse<T> {
    /// Reject descriptors with an empty `_id`, `_key` or `_rev`.
    pub(crate) fn validated(self) -> Result<Self> {
        for (name, value) in [("_id", &self.id), ("_key", &self.key), ("_rev", &self.rev)] {
            if value.is_empty() {
                return Err(ClientError::Deserialization(format!(
                    "document descriptor has an empty {name}"
                )));
            }
        }
        Ok(self)
    }
}

/// Failure of a single item in a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("document error {error_num}: {error_message}")]
pub struct DocumentError {
    pub error_num: i32,
    #[serde(default)]
    pub error_message: String,
}

/// Outcome of one item of a batch.
pub type DocumentResult<T = Value> = std::result::Result<DocumentResponse<T>, DocumentError>;

/// Ordered per-item outcomes of a batch operation.
///
/// Element `i` belongs to input item `i`. Per-item failures are data here:
/// inspect each element instead of expecting the call to fail.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentsResponse<T = Value> {
    items: Vec<DocumentResult<T>>,
}

impl<T> DocumentsResponse<T> {
    pub fn new(items: Vec<DocumentResult<T>>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DocumentResult<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentResult<T>> {
        self.items.iter()
    }

    /// `(index, descriptor)` of every item that succeeded.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &DocumentResponse<T>)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_ref().ok().map(|doc| (i, doc)))
    }

    /// `(index, error)` of every item that failed.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &DocumentError)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_ref().err().map(|err| (i, err)))
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| item.is_err())
    }

    pub fn into_inner(self) -> Vec<DocumentResult<T>> {
        self.items
    }
}

impl<T> Default for DocumentsResponse<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> std::ops::Index<usize> for DocumentsResponse<T> {
    type Output = DocumentResult<T>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<T> IntoIterator for DocumentsResponse<T> {
    type Item = DocumentResult<T>;
    type IntoIter = std::vec::IntoIter<DocumentResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a DocumentsResponse<T> {
    type Item = &'a DocumentResult<T>;
    type IntoIter = std::slice::Iter<'a, DocumentResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for DocumentsResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        raw.into_iter()
            .enumerate()
            .map(|(index, item)| decode_item(index, item))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map(Self::new)
            .map_err(de::Error::custom)
    }
}

/// Dispatch one batch element on its `error` flag.
fn decode_item<T: DeserializeOwned>(
    index: usize,
    item: Value,
) -> std::result::Result<DocumentResult<T>, String> {
    let failed = item.get("error").and_then(Value::as_bool).unwrap_or(false);
    if failed {
        return serde_json::from_value::<DocumentError>(item)
            .map(Err)
            .map_err(|e| format!("batch item {index}: invalid error descriptor: {e}"));
    }
    serde_json::from_value::<DocumentResponse<T>>(item)
        .map_err(|e| format!("batch item {index}: {e}"))?
        .validated()
        .map(Ok)
        .map_err(|e| format!("batch item {index}: {e}"))
}

/// Conflict handling when an inserted `_key` already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Keep the existing document and report success.
    Ignore,
    /// Replace the existing document.
    Replace,
    /// Merge into the existing document.
    Update,
    /// Fail with a unique constraint violation.
    Conflict,
}

impl OverwriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteMode::Ignore => "ignore",
            OverwriteMode::Replace => "replace",
            OverwriteMode::Update => "update",
            OverwriteMode::Conflict => "conflict",
        }
    }
}

impl fmt::Display for OverwriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for creating documents, single or batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDocumentsOptions {
    pub wait_for_sync: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub overwrite: Option<bool>,
    pub overwrite_mode: Option<OverwriteMode>,
    pub keep_null: Option<bool>,
    pub merge_objects: Option<bool>,
}

impl PostDocumentsOptions {
    pub(crate) fn to_query(&self) -> QueryParams {
        let mut query = QueryParams::new();
        query
            .push_opt("waitForSync", self.wait_for_sync)
            .push_opt("returnNew", self.return_new)
            .push_opt("returnOld", self.return_old)
            .push_opt("overwrite", self.overwrite)
            .push_opt("overwriteMode", self.overwrite_mode)
            .push_opt("keepNull", self.keep_null)
            .push_opt("mergeObjects", self.merge_objects);
        query
    }
}

/// Options for replacing documents.
///
/// `if_match` only applies to single-document calls; batch items carry
/// their own `_rev` and are checked when `ignore_revs` is `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutDocumentOptions {
    pub wait_for_sync: Option<bool>,
    pub ignore_revs: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub if_match: Option<String>,
}

impl PutDocumentOptions {
    pub(crate) fn to_query(&self) -> QueryParams {
        let mut query = QueryParams::new();
        query
            .push_opt("waitForSync", self.wait_for_sync)
            .push_opt("ignoreRevs", self.ignore_revs)
            .push_opt("returnNew", self.return_new)
            .push_opt("returnOld", self.return_old);
        query
    }
}

/// Options for partially updating documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchDocumentOptions {
    pub keep_null: Option<bool>,
    pub merge_objects: Option<bool>,
    pub wait_for_sync: Option<bool>,
    pub ignore_revs: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub if_match: Option<String>,
}

impl PatchDocumentOptions {
    pub(crate) fn to_query(&self) -> QueryParams {
        let mut query = QueryParams::new();
        query
            .push_opt("keepNull", self.keep_null)
            .push_opt("mergeObjects", self.merge_objects)
            .push_opt("waitForSync", self.wait_for_sync)
            .push_opt("ignoreRevs", self.ignore_revs)
            .push_opt("returnNew", self.return_new)
            .push_opt("returnOld", self.return_old);
        query
    }
}

/// Options for removing documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteDocumentOptions {
    pub wait_for_sync: Option<bool>,
    pub return_old: Option<bool>,
    pub if_match: Option<String>,
}

impl DeleteDocumentOptions {
    pub(crate) fn to_query(&self) -> QueryParams {
        let mut query = QueryParams::new();
        query
            .push_opt("waitForSync", self.wait_for_sync)
            .push_opt("returnOld", self.return_old);
        query
    }
}
