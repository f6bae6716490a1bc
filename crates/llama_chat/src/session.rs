use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::persistence::SessionIndex;
use crate::types::Message;

/// Everything about a chat except its messages. This is what the session
/// index stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub title: String,
    pub system_message: String,
    pub model_name: String,
    pub is_multi_modal: bool,
    pub is_anonymous: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub meta: SessionMeta,
    pub history: Vec<Message>,
}

/// Fields the user provides when starting a new chat.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub title: String,
    pub system_message: String,
    pub model_name: String,
    pub is_multi_modal: bool,
    pub is_anonymous: bool,
}

impl Session {
    /// Create a fresh session. Non-anonymous sessions get an id that is not
    /// yet present in `index`.
    pub fn create(settings: NewSession, index: &SessionIndex) -> Self {
        let id = if settings.is_anonymous {
            String::new()
        } else {
            generate_session_id(index)
        };
        Self {
            meta: SessionMeta {
                id,
                title: settings.title,
                system_message: settings.system_message,
                model_name: settings.model_name,
                is_multi_modal: settings.is_multi_modal,
                is_anonymous: settings.is_anonymous,
                updated_at: Utc::now(),
            },
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn is_anonymous(&self) -> bool {
        self.meta.is_anonymous
    }
}

/// Random UUIDv4 string, regenerated on collision with an indexed session.
pub fn generate_session_id(index: &SessionIndex) -> String {
    generate_unique_id(|candidate| index.contains(candidate), || {
        uuid::Uuid::new_v4().to_string()
    })
}

fn generate_unique_id(
    exists: impl Fn(&str) -> bool,
    mut next: impl FnMut() -> String,
) -> String {
    loop {
        let candidate = next();
        if !exists(&candidate) {
            return candidate;
        }
        warn!("Session id collision on {candidate}, regenerating");
    }
}
