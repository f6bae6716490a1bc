use std::time::Duration;

use ratatui::crossterm::event::{KeyEvent, MouseEvent};

use crate::types::Message;

/// Which copy command produced a clipboard write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    Highlighted,
    LastResponse,
}

impl CopyKind {
    pub fn confirmation(&self) -> &'static str {
        match self {
            CopyKind::Highlighted => "Copied highlighted message to clipboard",
            CopyKind::LastResponse => "Copied last response to clipboard",
        }
    }
}

/// Everything the chat state reacts to: terminal input plus messages from
/// background tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Key(KeyEvent),
    Paste(String),
    Mouse(MouseEvent),
    Resize { width: u16, height: u16 },
    StreamChunk(String),
    StreamFinished,
    StreamFailed(String),
    ClearNotification { generation: u64 },
    Copied(CopyKind),
    CopyFailed(String),
}

/// Input for one streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamJob {
    pub model: String,
    pub system_message: String,
    /// Conversation up to and including the new user message.
    pub history: Vec<Message>,
}

/// Side effects requested by the state; the app loop carries them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartStream(StreamJob),
    Copy { text: String, kind: CopyKind },
    ScheduleClear { generation: u64, after: Duration },
    Quit,
}
