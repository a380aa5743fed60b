//! Retrieval store boundary
//!
//! The orchestration core only needs one question answered by the vector
//! store: does a named collection exist? Agents referencing an existing
//! collection are classified as active librarians at load time; the core
//! never calls retrieval mid-conversation.

use crate::error::{Error, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Collection lookup interface consumed by the room loader
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Check whether a named collection exists in the store
    async fn collection_exists(&self, name: &str) -> Result<bool>;
}

/// HTTP retrieval store client (Qdrant-style collections endpoint)
pub struct HttpRetrievalStore {
    client: Client,
    base_url: String,
}

impl HttpRetrievalStore {
    /// Create a client for the given store base URL.
    ///
    /// # Errors
    /// Returns [`Error::Retrieval`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Retrieval(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!(
            "{}/collections/{name}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RetrievalStore for HttpRetrievalStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let url = self.collection_url(name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;

        debug!(collection = name, status = %response.status(), "Collection lookup");
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Error::Retrieval(format!(
                "collection lookup failed with status {}",
                response.status()
            )));
        }
        Ok(true)
    }
}
