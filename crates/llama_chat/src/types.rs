use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use llm::Role;

/// One entry of a conversation. Only the text of the last assistant message
/// changes after creation, and only while its response is streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Image attachment paths as the user picked them (may start with `~`).
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role,
            text: text.into(),
            images,
            created_at: Utc::now(),
        }
    }
}
