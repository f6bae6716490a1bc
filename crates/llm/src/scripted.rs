use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::ChatRequest;
use crate::{ModelClient, StreamingCallback};

/// Replays a fixed response. Used by tests and offline demos.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    deltas: Vec<String>,
    failure: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail with a stream error after all deltas were delivered.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Requests received so far, oldest first.
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        on_delta: &StreamingCallback,
    ) -> Result<(), LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        for delta in &self.deltas {
            on_delta(delta);
            tokio::task::yield_now().await;
        }
        match &self.failure {
            Some(message) => Err(LlmError::Stream(message.clone())),
            None => Ok(()),
        }
    }
}
