//! In-memory collections with ArangoDB's document semantics.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ArangoError;

const KEY_PUNCTUATION: &str = "_-:.@()+,=;$!*'%";
const MAX_KEY_BYTES: usize = 254;

/// Query-string flags accepted by the document endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub wait_for_sync: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub overwrite: Option<bool>,
    pub overwrite_mode: Option<String>,
    pub silent: Option<bool>,
    pub keep_null: Option<bool>,
    pub merge_objects: Option<bool>,
    pub ignore_revs: Option<bool>,
}

impl DocumentQuery {
    fn overwrite_mode(&self) -> Result<Option<OverwriteMode>, ArangoError> {
        match self.overwrite_mode.as_deref() {
            None => Ok(self.overwrite.unwrap_or(false).then_some(OverwriteMode::Replace)),
            Some("ignore") => Ok(Some(OverwriteMode::Ignore)),
            Some("replace") => Ok(Some(OverwriteMode::Replace)),
            Some("update") => Ok(Some(OverwriteMode::Update)),
            Some("conflict") => Ok(Some(OverwriteMode::Conflict)),
            Some(other) => Err(ArangoError::bad_parameter(format!(
                "invalid overwriteMode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverwriteMode {
    Ignore,
    Replace,
    Update,
    Conflict,
}

/// How a write combines with the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Replace,
    Update,
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_BYTES
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || KEY_PUNCTUATION.contains(c))
}

fn new_rev() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

/// Attach system attributes and a fresh revision.
fn stamp(collection: &str, key: &str, mut body: Map<String, Value>) -> Value {
    body.insert("_id".to_string(), json!(format!("{collection}/{key}")));
    body.insert("_key".to_string(), json!(key));
    body.insert("_rev".to_string(), json!(new_rev()));
    Value::Object(body)
}

fn strip_system(body: &mut Map<String, Value>) {
    body.remove("_id");
    body.remove("_key");
    body.remove("_rev");
}

fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>, keep_null: bool, merge_objects: bool) {
    for (name, value) in patch {
        match value {
            Value::Null if !keep_null => {
                target.remove(&name);
            }
            Value::Object(inner) if merge_objects => match target.get_mut(&name) {
                Some(Value::Object(existing)) => merge(existing, inner, keep_null, merge_objects),
                _ => {
                    target.insert(name, Value::Object(inner));
                }
            },
            other => {
                target.insert(name, other);
            }
        }
    }
}

fn descriptor(stored: &Value, old: Option<&Value>, query: &DocumentQuery) -> Value {
    let mut out = Map::new();
    for field in ["_id", "_key", "_rev"] {
        out.insert(field.to_string(), stored[field].clone());
    }
    if let Some(old) = old {
        out.insert("_oldRev".to_string(), old["_rev"].clone());
        if query.return_old == Some(true) {
            out.insert("old".to_string(), old.clone());
        }
    }
    if query.return_new == Some(true) {
        out.insert("new".to_string(), stored.clone());
    }
    Value::Object(out)
}

fn rev_matches(stored: &Value, expected: Option<&str>) -> bool {
    match expected {
        Some(rev) => stored["_rev"].as_str() == Some(rev),
        None => true,
    }
}

/// Collections keyed by name, each mapping `_key` to the stored document.
#[derive(Debug, Default)]
pub struct Store {
    collections: HashMap<String, HashMap<String, Value>>,
    last_key: u64,
}

impl Store {
    pub fn with_collections(names: &[&str]) -> Self {
        let mut store = Self::default();
        for name in names {
            store.create_collection(name);
        }
        store
    }

    /// Returns `false` if the collection already existed.
    pub fn create_collection(&mut self, name: &str) -> bool {
        if self.collections.contains_key(name) {
            return false;
        }
        self.collections.insert(name.to_string(), HashMap::new());
        true
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn count(&self, collection: &str) -> Option<usize> {
        self.collections.get(collection).map(HashMap::len)
    }

    pub fn get(&self, collection: &str, key: &str) -> Result<&Value, ArangoError> {
        self.collections
            .get(collection)
            .ok_or_else(ArangoError::collection_not_found)?
            .get(key)
            .ok_or_else(ArangoError::document_not_found)
    }

    /// Next counter value not already taken in `collection`.
    fn generate_key(&mut self, collection: &str) -> String {
        loop {
            self.last_key += 1;
            let key = self.last_key.to_string();
            let taken = self
                .collections
                .get(collection)
                .is_some_and(|documents| documents.contains_key(&key));
            if !taken {
                return key;
            }
        }
    }

    fn documents(&mut self, collection: &str) -> Result<&mut HashMap<String, Value>, ArangoError> {
        self.collections
            .get_mut(collection)
            .ok_or_else(ArangoError::collection_not_found)
    }

    /// Insert one document, honoring `overwrite`/`overwriteMode`.
    pub fn insert(&mut self, collection: &str, document: Value, query: &DocumentQuery) -> Result<Value, ArangoError> {
        if !self.has_collection(collection) {
            return Err(ArangoError::collection_not_found());
        }
        let mode = query.overwrite_mode()?;
        let Value::Object(mut body) = document else {
            return Err(ArangoError::invalid_type());
        };
        let key = match body.get("_key") {
            Some(Value::String(key)) if is_valid_key(key) => key.clone(),
            Some(_) => return Err(ArangoError::bad_key()),
            None => self.generate_key(collection),
        };
        // numeric user keys push the generator past them
        if let Ok(numeric) = key.parse::<u64>() {
            self.last_key = self.last_key.max(numeric);
        }
        strip_system(&mut body);

        let documents = self.documents(collection)?;
        let Some(existing) = documents.get(&key).cloned() else {
            let stored = stamp(collection, &key, body);
            documents.insert(key, stored.clone());
            return Ok(descriptor(&stored, None, query));
        };

        let merged = match mode {
            None | Some(OverwriteMode::Conflict) => return Err(ArangoError::unique_violation(&key)),
            Some(OverwriteMode::Ignore) => return Ok(descriptor(&existing, None, &DocumentQuery::default())),
            Some(OverwriteMode::Replace) => body,
            Some(OverwriteMode::Update) => {
                let mut target = existing.as_object().cloned().unwrap_or_default();
                merge(
                    &mut target,
                    body,
                    query.keep_null.unwrap_or(true),
                    query.merge_objects.unwrap_or(true),
                );
                strip_system(&mut target);
                target
            }
        };
        let stored = stamp(collection, &key, merged);
        documents.insert(key, stored.clone());
        Ok(descriptor(&stored, Some(&existing), query))
    }

    /// Replace or update one existing document.
    ///
    /// `key` comes from the URL for single calls; batch items carry it in
    /// `_key`. The revision is checked against `if_match`, or against the
    /// body's `_rev` when `ignoreRevs=false`.
    pub fn modify(
        &mut self,
        collection: &str,
        key: Option<&str>,
        document: Value,
        query: &DocumentQuery,
        if_match: Option<&str>,
        mutation: Mutation,
    ) -> Result<Value, ArangoError> {
        let Value::Object(mut body) = document else {
            return Err(ArangoError::invalid_type());
        };
        let key = match (key, body.get("_key")) {
            (Some(key), _) => key.to_string(),
            (None, Some(Value::String(key))) => key.clone(),
            (None, Some(_)) => return Err(ArangoError::bad_key()),
            (None, None) => return Err(ArangoError::missing_key()),
        };
        let body_rev = match query.ignore_revs {
            Some(false) => body.get("_rev").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        strip_system(&mut body);

        let documents = self.documents(collection)?;
        let existing = documents
            .get(&key)
            .cloned()
            .ok_or_else(ArangoError::document_not_found)?;
        if !rev_matches(&existing, if_match.or(body_rev.as_deref())) {
            return Err(ArangoError::rev_conflict());
        }

        let merged = match mutation {
            Mutation::Replace => body,
            Mutation::Update => {
                let mut target = existing.as_object().cloned().unwrap_or_default();
                merge(
                    &mut target,
                    body,
                    query.keep_null.unwrap_or(true),
                    query.merge_objects.unwrap_or(true),
                );
                strip_system(&mut target);
                target
            }
        };
        let stored = stamp(collection, &key, merged);
        documents.insert(key, stored.clone());
        Ok(descriptor(&stored, Some(&existing), query))
    }

    /// Remove one document selected by key string or `{_key, _rev}` object.
    pub fn remove(
        &mut self,
        collection: &str,
        selector: &Value,
        query: &DocumentQuery,
        if_match: Option<&str>,
    ) -> Result<Value, ArangoError> {
        let (key, selector_rev) = match selector {
            Value::String(key) => (key.as_str(), None),
            Value::Object(fields) => match fields.get("_key") {
                Some(Value::String(key)) => (
                    key.as_str(),
                    fields.get("_rev").and_then(Value::as_str),
                ),
                _ => return Err(ArangoError::missing_key()),
            },
            _ => return Err(ArangoError::invalid_type()),
        };
        let expected_rev = if_match.or(match query.ignore_revs {
            Some(false) => selector_rev,
            _ => None,
        });

        let documents = self.documents(collection)?;
        let existing = documents.get(key).ok_or_else(ArangoError::document_not_found)?;
        if !rev_matches(existing, expected_rev) {
            return Err(ArangoError::rev_conflict());
        }
        let removed = documents.remove(key).unwrap_or_default();

        let mut out = Map::new();
        for field in ["_id", "_key", "_rev"] {
            out.insert(field.to_string(), removed[field].clone());
        }
        if query.return_old == Some(true) {
            out.insert("old".to_string(), removed);
        }
        Ok(Value::Object(out))
    }
}
