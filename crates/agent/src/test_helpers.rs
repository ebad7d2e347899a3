//! Scripted collaborators shared by the agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ankigen_core::error::{EmbeddingError, ProviderError, SearchError};
use ankigen_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use ankigen_core::{Embedder, SearchProvider, SearchResult};
use async_trait::async_trait;

/// Replies with the next scripted outcome on each call and records every
/// request it sees. Panics when the script runs out.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self::with_outcomes(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn with_outcomes(outcomes: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.script.lock().unwrap().pop_front();
        let content = match next {
            Some(outcome) => outcome?,
            None => panic!("ScriptedProvider: no reply scripted for call #{call}"),
        };
        Ok(ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

/// Returns the same hits for every term; counts calls and remembers terms.
pub struct StaticSearch {
    results: Vec<SearchResult>,
    calls: AtomicUsize,
    terms: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
            terms: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn terms(&self) -> Vec<String> {
        self.terms.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.terms.lock().unwrap().push(query.to_string());
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}

/// Every search fails with a network error.
pub struct DownSearch;

#[async_trait]
impl SearchProvider for DownSearch {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        Err(SearchError::Network("connection refused".into()))
    }
}

/// Embedder whose liveness probe always fails.
pub struct DeadEmbedder {
    pub embed_calls: AtomicUsize,
}

impl DeadEmbedder {
    pub fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for DeadEmbedder {
    fn name(&self) -> &str {
        "dead"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Err(EmbeddingError::Unavailable("probe failed".into()))
    }

    async fn is_available(&self) -> bool {
        false
    }
}

pub fn hit(title: &str, text: &str) -> SearchResult {
    SearchResult::new(title, format!("https://example.com/{}", title.to_lowercase()), text)
}
