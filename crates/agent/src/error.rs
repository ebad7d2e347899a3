use ankigen_core::error::{Error, ProviderError};
use ankigen_retrieval::RetrievalError;
use thiserror::Error;

use crate::stage::StageKind;

/// Everything that can stop a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Collaborator(#[from] Error),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("stage {stage} produced invalid output: {reason}")]
    Validation { stage: StageKind, reason: String },

    #[error("card generation failed after {max_turns} agent turns")]
    TurnLimitExceeded { max_turns: u32 },

    #[error("agent is not waiting for a response")]
    NotAwaitingInput,

    #[error("response is empty")]
    EmptyResponse,

    #[error("no card to revise")]
    NoCard,

    #[error("{0}")]
    Revision(String),

    #[error("pipeline has not been run")]
    NotStarted,
}

impl From<ProviderError> for PipelineError {
    fn from(e: ProviderError) -> Self {
        PipelineError::Collaborator(Error::Provider(e))
    }
}
