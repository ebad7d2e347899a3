//! Web retrieval for ankigen: concurrent fan-out across search terms,
//! result formatting, and an embedding-based paragraph relevance filter.

pub mod aggregator;
pub mod error;
pub mod filter;
pub mod format;

pub use aggregator::{
    BLOCK_SEPARATOR, Retrieval, RetrievalAggregator, RetrievalOptions, Strategy, TermExpander,
};
pub use error::RetrievalError;
pub use filter::{cosine_similarity, split_paragraphs};
pub use format::{format_markdown, format_results, truncate_chars};
