//! The ankigen pipeline.
//!
//! A question goes through four fixed stages:
//!
//! 1. **Search terms**: the fast model proposes web queries
//! 2. **Retrieval**: the queries are searched concurrently and merged
//! 3. **Summarize**: the fast model condenses the research
//! 4. **Generate**: the agent loop decides, turn by turn, whether to write
//!    the card, refuse, search again, or ask the user
//!
//! [`Pipeline`] drives the stages and exposes the follow-up operations
//! (resume, cancel, regenerate, revise, history navigation).

pub mod controller;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod research;
pub mod stage;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{AgentController, TurnPolicy};
pub use error::PipelineError;
pub use llm::{ModelCaller, ModelTier};
pub use pipeline::{Pipeline, PipelineConfig};
pub use stage::StageKind;
