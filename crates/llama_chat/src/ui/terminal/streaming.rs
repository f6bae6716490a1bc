//! Background response streaming.
//!
//! One task per submitted prompt. The task never touches chat state; it
//! posts [`ChatEvent`]s into the same inbox the event loop drains, so deltas
//! are applied in the order they arrived.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use llm::{ChatMessage, ChatRequest, ModelClient, Role, StreamingCallback};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::events::{ChatEvent, StreamJob};
use crate::types::Message;
use crate::utils::expand_tilde;

/// Start streaming a response for `job`. The returned handle is not awaited
/// or aborted on quit; events sent after the loop is gone are dropped.
pub fn spawn_stream(
    client: Arc<dyn ModelClient>,
    job: StreamJob,
    inbox: async_channel::Sender<ChatEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let request = build_request(&job).await;
        debug!(
            "Streaming response from {} with {} messages",
            request.model,
            request.messages.len()
        );

        let chunk_tx = inbox.clone();
        let on_delta: StreamingCallback = Box::new(move |delta: &str| {
            if chunk_tx
                .try_send(ChatEvent::StreamChunk(delta.to_string()))
                .is_err()
            {
                trace!("Inbox closed, dropping delta");
            }
        });

        let outcome = match client.stream_chat(request, &on_delta).await {
            Ok(()) => ChatEvent::StreamFinished,
            Err(e) => ChatEvent::StreamFailed(e.to_string()),
        };
        if inbox.send(outcome).await.is_err() {
            debug!("Inbox closed before the stream completed");
        }
    })
}

/// Convert the chat history into a model request. A non-blank system message
/// goes first; attached images are read from disk and base64 encoded.
pub async fn build_request(job: &StreamJob) -> ChatRequest {
    let mut messages = Vec::with_capacity(job.history.len() + 1);
    if !job.system_message.trim().is_empty() {
        messages.push(ChatMessage::new(Role::System, job.system_message.clone()));
    }
    for message in &job.history {
        messages.push(to_chat_message(message).await);
    }
    ChatRequest {
        model: job.model.clone(),
        messages,
    }
}

async fn to_chat_message(message: &Message) -> ChatMessage {
    let mut chat = ChatMessage::new(message.role, message.text.clone());
    for image in &message.images {
        let path = expand_tilde(image);
        match tokio::fs::read(&path).await {
            Ok(bytes) => chat.images.push(STANDARD.encode(bytes)),
            Err(e) => warn!("Skipping unreadable image {}: {e}", path.display()),
        }
    }
    chat
}
