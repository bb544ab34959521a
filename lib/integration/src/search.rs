//! Web search.
//!
//! [`GoogleSearchClient`] queries the Custom Search JSON API and returns the
//! first page of results.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Custom Search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title.
    pub title: String,
    /// Text excerpt.
    #[serde(default)]
    pub snippet: String,
    /// Page URL.
    pub link: String,
}

/// Web search operations.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Returns the first page of results for `query`, in ranking order.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Configuration for [`GoogleSearchClient`].
#[derive(Debug, Clone)]
pub struct GoogleSearchConfig {
    /// API key.
    pub api_key: String,
    /// Programmable search engine id (`cx`).
    pub engine_id: String,
    /// Endpoint URL.
    pub endpoint: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl GoogleSearchConfig {
    /// Creates a configuration for the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    // Absent when the query has no hits.
    #[serde(default)]
    items: Vec<SearchResult>,
}

/// Google Custom Search client.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is empty or the HTTP client cannot be built.
    pub fn new(config: GoogleSearchConfig) -> Result<Self, SearchError> {
        if config.api_key.trim().is_empty() || config.engine_id.trim().is_empty() {
            return Err(SearchError::InvalidConfig {
                reason: "API key and engine id are required".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            api_key: config.api_key.trim().to_string(),
            engine_id: config.engine_id.trim().to_string(),
        })
    }
}

#[async_trait]
impl SearchApi for GoogleSearchClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
            ])
            .send()
            .await
            .map_err(|e| SearchError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse =
            response
                .json()
                .await
                .map_err(|e| SearchError::ProtocolError {
                    reason: e.to_string(),
                })?;

        debug!(results = parsed.items.len(), "Search completed");
        Ok(parsed.items)
    }
}
