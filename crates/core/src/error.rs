//! Error types for the ankigen domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error type so callers can tell a failed
//! model call apart from a failed search or embedding request.

use thiserror::Error;

/// The top-level error type for collaborator-backed operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Search errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search backend not configured: {0}")]
    NotConfigured(String),

    #[error("Search API error {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Search request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding server unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding API error {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}
