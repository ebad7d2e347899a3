//! Model-backed helpers for the research stages.

use ankigen_core::error::ProviderError;
use ankigen_core::json::decode_array;
use ankigen_retrieval::TermExpander;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::llm::{ModelCaller, ModelTier};
use crate::prompts;

const CREATIVE_TEMPERATURE: f32 = 0.8;

/// Decode a JSON array of strings, dropping blank entries.
pub fn parse_terms(reply: &str) -> Option<Vec<String>> {
    let terms: Vec<String> = decode_array(reply).ok()?;
    Some(
        terms
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// Stage 1. Never fails: any problem degrades to searching the question
/// itself.
pub async fn generate_search_terms(llm: &ModelCaller, question: &str) -> Vec<String> {
    let fallback = || vec![question.to_string()];

    let reply = match llm
        .call(None, &prompts::search_terms_prompt(question), ModelTier::Fast)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Search term generation failed, using the question");
            return fallback();
        }
    };

    match parse_terms(&reply) {
        Some(terms) if !terms.is_empty() => {
            debug!(count = terms.len(), "Search terms generated");
            terms
        }
        _ => {
            warn!(reply = %reply, "Unusable search term reply, using the question");
            fallback()
        }
    }
}

/// Lateral terms from the fast model at a higher temperature.
pub struct CreativeTerms<'a> {
    llm: &'a ModelCaller,
}

impl<'a> CreativeTerms<'a> {
    pub fn new(llm: &'a ModelCaller) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl TermExpander for CreativeTerms<'_> {
    async fn expand(&self, question: &str) -> Result<Vec<String>, ProviderError> {
        let reply = self
            .llm
            .call_at(
                None,
                &prompts::creative_terms_prompt(question),
                ModelTier::Fast,
                CREATIVE_TEMPERATURE,
            )
            .await?;

        Ok(parse_terms(&reply).unwrap_or_else(|| {
            warn!(reply = %reply, "Creative terms were not a JSON array");
            Vec::new()
        }))
    }
}

/// Stage 3: condense the research into a few hundred words.
pub async fn summarize(
    llm: &ModelCaller,
    question: &str,
    research: &str,
) -> Result<String, ProviderError> {
    llm.call(None, &prompts::summary_prompt(question, research), ModelTier::Fast)
        .await
}
