//! Embedding collaborator.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Turns texts into vectors.
///
/// `embed` must return one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Cheap liveness probe. Never errors; an unreachable server is just `false`.
    async fn is_available(&self) -> bool;
}
