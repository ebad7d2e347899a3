//! Thin wrapper over a [`Provider`] that picks the model tier and cleans
//! scratch blocks out of the reply.

use std::sync::Arc;

use ankigen_core::error::ProviderError;
use ankigen_core::json::strip_tags;
use ankigen_core::provider::{Provider, ProviderRequest};
use tracing::debug;

/// Reasoning and drafting blocks models wrap around their answer.
pub const SCRATCH_TAGS: &[&str] = &["think", "thinking", "drafts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheap calls: search terms, creative terms, summaries.
    Fast,
    /// Card writing and agent decisions.
    Primary,
}

pub struct ModelCaller {
    provider: Arc<dyn Provider>,
    model: String,
    fast_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    /// Route primary-tier calls to the fast model too.
    fast_mode: bool,
}

impl ModelCaller {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            provider,
            fast_model: model.clone(),
            model,
            temperature: 0.7,
            max_tokens: None,
            fast_mode: false,
        }
    }

    pub fn with_fast_model(mut self, model: impl Into<String>) -> Self {
        self.fast_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_fast_mode(mut self, enabled: bool) -> Self {
        self.fast_mode = enabled;
        self
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary if !self.fast_mode => &self.model,
            _ => &self.fast_model,
        }
    }

    /// Complete at the default temperature. Returns the reply with scratch
    /// blocks removed and surrounding whitespace trimmed.
    pub async fn call(
        &self,
        system: Option<&str>,
        user: &str,
        tier: ModelTier,
    ) -> Result<String, ProviderError> {
        self.call_at(system, user, tier, self.temperature).await
    }

    pub async fn call_at(
        &self,
        system: Option<&str>,
        user: &str,
        tier: ModelTier,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model_for(tier).to_string(),
            system_prompt: system.map(String::from),
            user_prompt: user.to_string(),
            temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await?;
        debug!(
            model = %response.model,
            chars = response.content.len(),
            "Model replied"
        );
        Ok(strip_tags(&response.content, SCRATCH_TAGS))
    }
}
