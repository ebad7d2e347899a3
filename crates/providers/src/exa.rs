//! Exa neural search backend (`POST /search`).

use std::time::Duration;

use ankigen_core::error::SearchError;
use ankigen_core::search::{SearchProvider, SearchResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Characters of page text requested per result.
const MAX_TEXT_CHARS: usize = 1000;

pub struct ExaSearch {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ExaSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.exa.ai")
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
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

    fn request_body(query: &str, max_results: usize) -> serde_json::Value {
        serde_json::json!({
            "query": query,
            "numResults": max_results,
            "contents": {
                "text": { "maxCharacters": MAX_TEXT_CHARS }
            }
        })
    }
}

#[async_trait]
impl SearchProvider for ExaSearch {
    fn name(&self) -> &str {
        "exa"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<SearchResult>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NotConfigured("EXA_API_KEY not set".into()));
        }

        debug!(query, max_results, "Exa search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .json(&Self::request_body(query, max_results))
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
            warn!(status, body = %body, "Exa returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let parsed: ExaResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        Ok(parsed.into_results())
    }
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaHit>,
}

#[derive(Debug, Deserialize)]
struct ExaHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: Option<String>,
}

impl ExaResponse {
    fn into_results(self) -> Vec<SearchResult> {
        self.results
            .into_iter()
            .map(|hit| {
                SearchResult::new(
                    hit.title.unwrap_or_default(),
                    hit.url,
                    hit.text.unwrap_or_default(),
                )
            })
            .collect()
    }
}
