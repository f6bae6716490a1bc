//! Full screen terminal chat.

pub mod app;
pub mod bubble;
pub mod composer;
pub mod events;
pub mod history;
pub mod image_art;
pub mod image_picker;
pub mod keys;
pub mod markdown;
pub mod new_chat;
pub mod overlay;
pub mod state;
pub mod streaming;
pub mod theme;
pub mod tui;
pub mod view;
pub mod viewport;

pub use app::TerminalChatApp;
pub use events::{ChatEvent, CopyKind, Effect, StreamJob};
pub use new_chat::{run_new_chat_form, NewChatInput};
pub use state::{ChatSettings, ChatState, Mode};
