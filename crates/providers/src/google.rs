//! Google Programmable Search (Custom Search JSON API) backend.

use std::time::Duration;

use ankigen_core::error::SearchError;
use ankigen_core::search::{SearchProvider, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The API serves at most 10 results per request.
const MAX_PER_REQUEST: usize = 10;

pub struct GoogleSearch {
    api_key: String,
    cx: String,
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleSearch {
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            endpoint: ENDPOINT.to_string(),
            client,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<SearchResult>, SearchError> {
        if self.api_key.is_empty() || self.cx.is_empty() {
            return Err(SearchError::NotConfigured(
                "google API key and CX required".into(),
            ));
        }

        let num = max_results.clamp(1, MAX_PER_REQUEST).to_string();
        debug!(query, num = %num, "Google search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Google search returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let parsed: GoogleResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parsed.into_results())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    /// Absent when the query matched nothing.
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleResponse {
    fn into_results(self) -> Vec<SearchResult> {
        self.items
            .into_iter()
            .map(|item| SearchResult::new(item.title, item.link, item.snippet))
            .collect()
    }
}
