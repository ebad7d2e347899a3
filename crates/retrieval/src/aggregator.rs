//! Concurrent retrieval across search terms.
//!
//! Every term gets its own worker task. Workers are bounded by a semaphore
//! and report back over an mpsc channel; the aggregator drains the channel
//! until every worker has finished, then merges whatever succeeded.

use std::sync::Arc;

use ankigen_core::error::{ProviderError, SearchError};
use ankigen_core::{Embedder, SearchProvider, SearchResult};
use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::error::RetrievalError;
use crate::filter;
use crate::format::{format_markdown, format_results, truncate_chars};

/// Separator written after each term's block in direct retrieval.
pub const BLOCK_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Fan out the given terms and concatenate per-term blocks.
    Direct,
    /// Add lateral terms and filter paragraphs by embedding similarity,
    /// when the embedder is reachable.
    #[default]
    Semantic,
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub strategy: Strategy,
    /// Hits requested per term.
    pub num_results: usize,
    pub max_concurrency: usize,
    pub focus_threshold: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Semantic,
            num_results: 5,
            max_concurrency: 8,
            focus_threshold: 0.7,
        }
    }
}

/// Source of extra, lateral search terms for semantic retrieval.
#[async_trait]
pub trait TermExpander: Send + Sync {
    async fn expand(&self, question: &str) -> Result<Vec<String>, ProviderError>;
}

/// What stage 2 hands to the summarizer.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Merged research text.
    pub text: String,
    /// Every term that was searched, creative ones included.
    pub terms: Vec<String>,
    /// Whether the semantic filter was applied successfully.
    pub filtered: bool,
}

/// One term's outcome, tagged with the term's position.
struct TermOutcome {
    index: usize,
    term: String,
    result: Result<Vec<SearchResult>, SearchError>,
}

pub struct RetrievalAggregator {
    search: Arc<dyn SearchProvider>,
    embedder: Option<Arc<dyn Embedder>>,
    options: RetrievalOptions,
}

impl RetrievalAggregator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        embedder: Option<Arc<dyn Embedder>>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            search,
            embedder,
            options,
        }
    }

    /// Run stage 2 with the configured strategy.
    pub async fn retrieve(
        &self,
        question: &str,
        terms: &[String],
        expander: &dyn TermExpander,
    ) -> Result<Retrieval, RetrievalError> {
        match self.options.strategy {
            Strategy::Direct => self.retrieve_direct(terms).await,
            Strategy::Semantic => self.retrieve_semantic(question, terms, expander).await,
        }
    }

    /// Search every term and concatenate per-term markdown blocks.
    pub async fn retrieve_direct(&self, terms: &[String]) -> Result<Retrieval, RetrievalError> {
        let hits = self.fan_out(terms).await?;

        let mut text = String::new();
        for (_, results) in &hits {
            let block = format_markdown(results);
            if block.trim().is_empty() {
                continue;
            }
            text.push_str(&block);
            text.push_str(BLOCK_SEPARATOR);
        }

        info!(terms = terms.len(), bytes = text.len(), "Direct retrieval done");
        Ok(Retrieval {
            text,
            terms: terms.to_vec(),
            filtered: false,
        })
    }

    /// Expand terms and filter by relevance when the embedder is live;
    /// otherwise a plain fan-out over the given terms.
    pub async fn retrieve_semantic(
        &self,
        question: &str,
        terms: &[String],
        expander: &dyn TermExpander,
    ) -> Result<Retrieval, RetrievalError> {
        let live = match &self.embedder {
            Some(embedder) => embedder.is_available().await,
            None => false,
        };
        if self.embedder.is_some() && !live {
            info!("Skipping semantic filtering (embed server unavailable)");
        }
        let embedder = if live { self.embedder.as_deref() } else { None };

        let mut all_terms = terms.to_vec();
        if embedder.is_some() {
            match expander.expand(question).await {
                Ok(extra) => {
                    let before = all_terms.len();
                    merge_terms(&mut all_terms, extra);
                    debug!(added = all_terms.len() - before, "Creative terms merged");
                }
                Err(e) => warn!(error = %e, "Creative term generation failed"),
            }
        }

        let hits = self.fan_out(&all_terms).await?;
        let results: Vec<SearchResult> = hits.into_iter().flat_map(|(_, r)| r).collect();

        let (results, filtered) = match embedder {
            Some(embedder) => {
                let outcome =
                    filter::filter(embedder, question, &results, self.options.focus_threshold)
                        .await;
                match outcome {
                    Ok(focused) => (focused, true),
                    Err(e) => {
                        warn!(error = %e, "Filtering failed, using original results");
                        (results, false)
                    }
                }
            }
            None => (results, false),
        };

        let text = format_results(&results);
        info!(
            terms = all_terms.len(),
            results = results.len(),
            filtered,
            "Semantic retrieval done"
        );
        Ok(Retrieval {
            text,
            terms: all_terms,
            filtered,
        })
    }

    /// One search on behalf of the agent, formatted and truncated.
    pub async fn search_one(
        &self,
        term: &str,
        max_results: usize,
        max_chars: usize,
    ) -> Result<String, SearchError> {
        let results = self.search.search(term, max_results).await?;
        Ok(truncate_chars(&format_results(&results), max_chars))
    }

    /// Search all terms concurrently. Returns the successful `(term, hits)`
    /// pairs in term order; fails only if every term failed.
    pub async fn fan_out(
        &self,
        terms: &[String],
    ) -> Result<Vec<(String, Vec<SearchResult>)>, RetrievalError> {
        if terms.is_empty() {
            return Err(RetrievalError::NoTerms);
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<TermOutcome>(terms.len());

        for (index, term) in terms.iter().enumerate() {
            let tx = tx.clone();
            let sem = semaphore.clone();
            let search = self.search.clone();
            let term = term.clone();
            let max_results = self.options.num_results;

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return;
                };
                debug!(term = %term, "Search worker started");
                let result = search.search(&term, max_results).await;
                let _ = tx
                    .send(TermOutcome {
                        index,
                        term,
                        result,
                    })
                    .await;
            });
        }
        drop(tx);

        let mut succeeded = Vec::with_capacity(terms.len());
        while let Some(outcome) = rx.recv().await {
            match outcome.result {
                Ok(results) => {
                    debug!(term = %outcome.term, hits = results.len(), "Search succeeded");
                    succeeded.push((outcome.index, outcome.term, results));
                }
                Err(e) => warn!(term = %outcome.term, error = %e, "Search failed"),
            }
        }

        if succeeded.is_empty() {
            return Err(RetrievalError::AllSearchesFailed { terms: terms.len() });
        }

        succeeded.sort_by_key(|(index, _, _)| *index);
        Ok(succeeded
            .into_iter()
            .map(|(_, term, results)| (term, results))
            .collect())
    }
}

/// Append `extra` terms not already present (case-insensitive, trimmed).
fn merge_terms(terms: &mut Vec<String>, extra: Vec<String>) {
    for term in extra {
        let term = term.trim().to_string();
        if term.is_empty() {
            continue;
        }
        let exists = terms.iter().any(|t| t.trim().eq_ignore_ascii_case(&term));
        if !exists {
            terms.push(term);
        }
    }
}
