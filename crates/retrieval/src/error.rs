use ankigen_core::error::EmbeddingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("all web searches failed ({terms} terms)")]
    AllSearchesFailed { terms: usize },

    #[error("no search terms to run")]
    NoTerms,

    #[error("semantic filter failed: {0}")]
    Filter(#[from] EmbeddingError),
}
