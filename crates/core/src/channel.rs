//! User input channel: how the agent's `ask` action reaches a human.

use async_trait::async_trait;

/// What came back from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReply {
    /// Free-text answer; resumes the agent loop.
    Response(String),
    /// The user declined to answer; the loop resolves as a refusal.
    Cancelled,
}

#[async_trait]
pub trait InputChannel: Send + Sync {
    /// Present `question` and wait for the user's reply.
    async fn ask(&self, question: &str) -> UserReply;
}
