//! # ankigen core
//!
//! Domain types, collaborator traits, and error definitions for the ankigen
//! card pipeline. No I/O happens here: model, search and embedding backends
//! are traits implemented in `ankigen-providers`, and the pipeline that
//! drives them lives in `ankigen-agent`.

pub mod agent;
pub mod card;
pub mod channel;
pub mod collaborators;
pub mod context;
pub mod embedding;
pub mod error;
pub mod history;
pub mod json;
pub mod provider;
pub mod search;

pub use agent::{AgentState, SearchLimit};
pub use card::{AgentResponse, Card, DebugTurn};
pub use channel::{InputChannel, UserReply};
pub use collaborators::Collaborators;
pub use context::{CANCELLED_REASON, PipelineContext};
pub use embedding::Embedder;
pub use error::{EmbeddingError, Error, ProviderError, Result, SearchError};
pub use history::CardHistory;
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{SearchProvider, SearchResult};
