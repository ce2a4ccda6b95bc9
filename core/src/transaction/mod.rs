//! Transaction API client (`_api/transaction`).
//!
//! A JavaScript transaction commits or aborts as a whole, so there is no
//! per-item outcome: a non-2xx status always fails the call.

mod models;

use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::Result;

pub use models::{PostTransactionBody, PostTransactionResponse, TransactionCollections};

const TRANSACTION_API_PATH: &str = "_api/transaction";

#[derive(Debug, Clone)]
pub struct TransactionApiClient {
    api: ApiClient,
}

impl TransactionApiClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Run a JavaScript transaction and decode its return value as `T`.
    pub async fn post_transaction<T: DeserializeOwned>(
        &self,
        request: &PostTransactionBody,
    ) -> Result<PostTransactionResponse<T>> {
        let body = self.api.encode(request)?;
        let response = self.api.transport().post(TRANSACTION_API_PATH, body).await?;
        self.api.expect_success(response).await
    }
}
