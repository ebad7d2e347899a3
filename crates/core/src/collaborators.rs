//! The set of external services one pipeline run talks to.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::provider::Provider;
use crate::search::SearchProvider;

/// Model, search and (optional) embedding backends, shared by handle.
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn Provider>,
    pub search: Arc<dyn SearchProvider>,
    /// `None` disables the semantic retrieval strategy.
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("provider", &self.provider.name())
            .field("search", &self.search.name())
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}
