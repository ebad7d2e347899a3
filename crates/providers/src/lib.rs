//! Backend implementations for ankigen.
//!
//! Model and embedding backends speak the OpenAI-compatible HTTP API; web
//! search goes to Exa or Google. The router builds the set a run needs from
//! configuration.

pub mod exa;
pub mod google;
pub mod openai_compat;
pub mod router;

pub use exa::ExaSearch;
pub use google::GoogleSearch;
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};
pub use router::{build_from_config, resolve_model};
