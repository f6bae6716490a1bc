use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed stream chunk: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("stream error: {0}")]
    Stream(String),
}
