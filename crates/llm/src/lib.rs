//! Model client boundary for the chat UI.
//!
//! The UI only ever sees [`ModelClient`]: a request goes in, text deltas come
//! back through a callback in arrival order, and the future resolves when the
//! stream ends.

pub mod error;
pub mod ollama;
pub mod scripted;
pub mod types;

pub use error::LlmError;
pub use ollama::OllamaClient;
pub use scripted::ScriptedClient;
pub use types::{ChatMessage, ChatRequest, Role};

use async_trait::async_trait;

/// Receives each text delta as it arrives.
pub type StreamingCallback = Box<dyn Fn(&str) + Send + Sync>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Issue a chat request and deliver the response incrementally.
    ///
    /// Returns once the backend signals end of stream. No timeout or retry is
    /// applied here.
    async fn stream_chat(
        &self,
        request: ChatRequest,
        on_delta: &StreamingCallback,
    ) -> Result<(), LlmError>;
}
