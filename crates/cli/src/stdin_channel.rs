//! Answers agent questions from the terminal.

use ankigen_core::{InputChannel, UserReply};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Prints the question on stderr and reads one line from stdin.
/// An empty line or end of input cancels.
pub struct StdinChannel;

#[async_trait]
impl InputChannel for StdinChannel {
    async fn ask(&self, question: &str) -> UserReply {
        let mut stderr = tokio::io::stderr();
        let prompt = format!("\n  Agent asks: {question}\n  (empty line to cancel) > ");
        if stderr.write_all(prompt.as_bytes()).await.is_err() {
            return UserReply::Cancelled;
        }
        let _ = stderr.flush().await;

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(0) | Err(_) => UserReply::Cancelled,
            Ok(_) if line.trim().is_empty() => UserReply::Cancelled,
            Ok(_) => UserReply::Response(line.trim().to_string()),
        }
    }
}
