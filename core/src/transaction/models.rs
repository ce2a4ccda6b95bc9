use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collections a JavaScript transaction declares up front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCollections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive: Vec<String>,
}

/// Body of `POST _api/transaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTransactionBody {
    pub collections: TransactionCollections,
    /// JavaScript function source executed by the server.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_implicit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_transaction_size: Option<u64>,
}

impl PostTransactionBody {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            collections: TransactionCollections::default(),
            action: action.into(),
            params: None,
            wait_for_sync: None,
            allow_implicit: None,
            lock_timeout: None,
            max_transaction_size: None,
        }
    }

    pub fn read(mut self, collection: impl Into<String>) -> Self {
        self.collections.read.push(collection.into());
        self
    }

    pub fn write(mut self, collection: impl Into<String>) -> Self {
        self.collections.write.push(collection.into());
        self
    }

    pub fn exclusive(mut self, collection: impl Into<String>) -> Self {
        self.collections.exclusive.push(collection.into());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Successful transaction outcome wrapping the action's return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTransactionResponse<T> {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: u16,
    pub result: T,
}
