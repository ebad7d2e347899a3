//! Collaborator router: builds the backends a run needs from config.

use std::sync::Arc;
use std::time::Duration;

use ankigen_config::{AppConfig, SearchBackend};
use ankigen_core::error::ProviderError;
use ankigen_core::{Collaborators, Embedder, Provider, SearchProvider};
use tracing::{debug, info};

use crate::exa::ExaSearch;
use crate::google::GoogleSearch;
use crate::openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};

/// Build the model, search and embedding backends from configuration.
///
/// Missing API keys are not an error here; the affected backend reports
/// `NotConfigured` when first used, so runs that never search still work.
pub fn build_from_config(config: &AppConfig) -> Collaborators {
    let api_key = config.provider.api_key.clone().unwrap_or_default();

    let provider: Arc<dyn Provider> = Arc::new(
        OpenAiCompatProvider::new("openai-compat", &config.provider.api_url, &api_key)
            .with_timeout(Duration::from_secs(config.provider.timeout_secs)),
    );

    let search_timeout = Duration::from_secs(config.search.timeout_secs);
    let search: Arc<dyn SearchProvider> = match config.search.backend {
        SearchBackend::Exa => Arc::new(
            ExaSearch::with_base_url(
                config.search.exa_api_key.clone().unwrap_or_default(),
                &config.search.exa_url,
            )
            .with_timeout(search_timeout),
        ),
        SearchBackend::Google => Arc::new(
            GoogleSearch::new(
                config.search.google_api_key.clone().unwrap_or_default(),
                config.search.google_cx.clone().unwrap_or_default(),
            )
            .with_timeout(search_timeout),
        ),
    };

    let embedder: Option<Arc<dyn Embedder>> = config.embedding.enabled.then(|| {
        let key = config
            .embedding
            .api_key
            .clone()
            .unwrap_or_else(|| api_key.clone());
        Arc::new(
            OpenAiCompatEmbedder::new(config.embedding_url(), key, &config.embedding.model)
                .with_timeouts(
                    Duration::from_secs(config.embedding.timeout_secs),
                    Duration::from_secs(config.embedding.probe_timeout_secs),
                ),
        ) as Arc<dyn Embedder>
    });

    debug!(
        search = search.name(),
        embedder = embedder.is_some(),
        "Collaborators built"
    );

    Collaborators {
        provider,
        search,
        embedder,
    }
}

/// Pick the model to use: the configured one, or the first the server lists.
pub async fn resolve_model(
    provider: &dyn Provider,
    configured: &str,
) -> std::result::Result<String, ProviderError> {
    if !configured.trim().is_empty() {
        return Ok(configured.to_string());
    }

    let models = provider.list_models().await?;
    let model = models.into_iter().next().ok_or_else(|| {
        ProviderError::ModelNotFound(format!("no models available on {}", provider.name()))
    })?;
    info!(model = %model, "Using first model listed by server");
    Ok(model)
}
