//! One-shot generation: answer a single prompt straight to a writer, without
//! the chat screen.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use llm::{ModelClient, StreamingCallback};
use tracing::{debug, info};

use crate::types::{Message, Role};
use crate::ui::terminal::streaming::build_request;
use crate::ui::terminal::StreamJob;

/// Merge text piped on stdin with the prompt flag. Piped text alone becomes
/// the prompt; together it is passed as context for the question.
pub fn combine_prompt(piped: Option<&str>, prompt: Option<&str>) -> String {
    let prompt = prompt.map(str::trim).unwrap_or_default();
    match piped.map(str::trim).filter(|p| !p.is_empty()) {
        None => prompt.to_string(),
        Some(context) if prompt.is_empty() => context.to_string(),
        Some(context) => format!("Context: {context}\n\nQuestion: {prompt}"),
    }
}

struct Sink<W> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> Sink<W> {
    fn write(&mut self, delta: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self
            .out
            .write_all(delta.as_bytes())
            .and_then(|()| self.out.flush())
        {
            self.error = Some(e);
        }
    }
}

/// Stream the answer to `prompt` into `out`, followed by a newline. Images
/// are tilde expanded and base64 encoded; unreadable ones are skipped.
/// Returns the writer once the stream ended.
pub async fn generate<W>(
    client: &dyn ModelClient,
    model: &str,
    prompt: &str,
    images: &[String],
    out: W,
) -> Result<W>
where
    W: Write + Send + 'static,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(anyhow!("Prompt can't be empty"));
    }

    let job = StreamJob {
        model: model.to_string(),
        system_message: String::new(),
        history: vec![Message::new(Role::User, prompt, images.to_vec())],
    };
    let request = build_request(&job).await;
    info!(
        "Generating with {} ({} images attached)",
        request.model,
        request.messages.iter().map(|m| m.images.len()).sum::<usize>()
    );

    let sink = Arc::new(Mutex::new(Sink { out, error: None }));
    let writer = sink.clone();
    let on_delta: StreamingCallback = Box::new(move |delta: &str| {
        if let Ok(mut sink) = writer.lock() {
            sink.write(delta);
        }
    });
    let result = client.stream_chat(request, &on_delta).await;
    drop(on_delta);

    let Sink { mut out, error } = Arc::try_unwrap(sink)
        .map_err(|_| anyhow!("Output is still borrowed by the stream"))?
        .into_inner()
        .map_err(|_| anyhow!("Output lock poisoned"))?;
    if let Some(e) = error {
        return Err(e).context("Failed to write the response");
    }
    writeln!(out).context("Failed to write the response")?;
    result.context("Generation failed")?;
    debug!("Generation finished");
    Ok(out)
}
