use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::LlmError;
use crate::types::{ChatMessage, ChatRequest};
use crate::{ModelClient, StreamingCallback};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Streaming client for an Ollama server (`/api/chat`).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiChatChunk {
    #[serde(default)]
    message: Option<ApiChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), suffix)
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self.client.get(self.url("/api/tags")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body,
            });
        }
        let tags: TagResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        on_delta: &StreamingCallback,
    ) -> Result<(), LlmError> {
        debug!(
            "POST /api/chat model={} messages={}",
            request.model,
            request.messages.len()
        );
        let body = ApiChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineDecoder::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                if handle_line(&line, on_delta)? {
                    return Ok(());
                }
            }
        }
        if let Some(line) = lines.finish() {
            handle_line(&line, on_delta)?;
        }
        Ok(())
    }
}

/// Apply one NDJSON line. Returns true once the server reports `done`.
fn handle_line(line: &str, on_delta: &StreamingCallback) -> Result<bool, LlmError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    trace!("chat chunk: {line}");
    let chunk: ApiChatChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(LlmError::Stream(error));
    }
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            on_delta(&message.content);
        }
    }
    Ok(chunk.done)
}

/// Splits a byte stream into complete lines; chunk boundaries may fall
/// anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
