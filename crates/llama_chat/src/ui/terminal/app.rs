use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use llm::ModelClient;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::events::{ChatEvent, Effect};
use super::state::{ChatSettings, ChatState};
use super::viewport::HitMap;
use super::{streaming, tui, view};
use crate::clipboard::ClipboardSink;
use crate::types::Message;

/// Relative timestamps under assistant bubbles age even without input.
const REDRAW_INTERVAL: Duration = Duration::from_secs(30);

/// Map a terminal event onto the chat's event type. Key releases and focus
/// changes are dropped.
fn translate(event: Event) -> Option<ChatEvent> {
    match event {
        Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
            Some(ChatEvent::Key(key))
        }
        Event::Paste(text) => Some(ChatEvent::Paste(text)),
        Event::Mouse(mouse) => Some(ChatEvent::Mouse(mouse)),
        Event::Resize(width, height) => Some(ChatEvent::Resize { width, height }),
        _ => None,
    }
}

pub struct TerminalChatApp {
    client: Arc<dyn ModelClient>,
    clipboard: Box<dyn ClipboardSink>,
    settings: ChatSettings,
}

impl TerminalChatApp {
    pub fn new(
        client: Arc<dyn ModelClient>,
        clipboard: Box<dyn ClipboardSink>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            client,
            clipboard,
            settings,
        }
    }

    /// Run the chat until the user quits and return the final history.
    pub async fn run(&self, history: Vec<Message>) -> Result<Vec<Message>> {
        let mut terminal = tui::init()?;
        let loop_result = self.event_loop(&mut terminal, history).await;

        // Restore the terminal even when the loop failed
        let cleanup_result = tui::restore();
        if let Err(cleanup_error) = cleanup_result {
            if loop_result.is_ok() {
                return Err(cleanup_error.into());
            }
            warn!("Terminal cleanup failed after loop error: {}", cleanup_error);
        }
        loop_result
    }

    async fn event_loop(
        &self,
        terminal: &mut tui::Terminal,
        history: Vec<Message>,
    ) -> Result<Vec<Message>> {
        let size = terminal.size()?;
        let mut state = ChatState::new(self.settings.clone(), history, size.width, size.height);
        let (inbox_tx, inbox_rx) = async_channel::unbounded::<ChatEvent>();
        let mut event_stream = EventStream::new();
        let mut needs_redraw = true;
        info!(
            "Chat started with {} ({} messages)",
            self.settings.model_name,
            state.history().len()
        );

        'outer: loop {
            if needs_redraw {
                let now = Utc::now();
                let mut hits = HitMap::default();
                terminal.draw(|frame| hits = view::draw(frame, &state, now))?;
                state.set_hit_map(hits);
                needs_redraw = false;
            }

            let event = tokio::select! {
                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => match translate(event) {
                        Some(event) => event,
                        None => continue,
                    },
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        debug!("Terminal event stream ended");
                        break;
                    }
                },
                Ok(event) = inbox_rx.recv() => event,
                _ = tokio::time::sleep(REDRAW_INTERVAL) => {
                    needs_redraw = true;
                    continue;
                }
            };

            needs_redraw = true;
            for effect in state.update(event) {
                if self.execute(effect, &inbox_tx) {
                    break 'outer;
                }
            }
        }

        Ok(state.into_messages())
    }

    /// Carry out one effect. Results come back through `inbox`. Returns true
    /// when the loop should stop.
    fn execute(&self, effect: Effect, inbox: &async_channel::Sender<ChatEvent>) -> bool {
        match effect {
            Effect::StartStream(job) => {
                // Detached: a stream still running at quit is abandoned.
                streaming::spawn_stream(self.client.clone(), job, inbox.clone());
            }
            Effect::Copy { text, kind } => {
                let outcome = match self.clipboard.set_text(&text) {
                    Ok(()) => ChatEvent::Copied(kind),
                    Err(e) => ChatEvent::CopyFailed(e.to_string()),
                };
                let _ = inbox.try_send(outcome);
            }
            Effect::ScheduleClear { generation, after } => {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = inbox
                        .send(ChatEvent::ClearNotification { generation })
                        .await;
                });
            }
            Effect::Quit => return true,
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::config::ImageStyle;
    use crate::ui::terminal::events::{CopyKind, StreamJob};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use llm::ScriptedClient;

    fn settings() -> ChatSettings {
        ChatSettings {
            model_name: "llama3".to_string(),
            title: "t".to_string(),
            system_message: String::new(),
            multimodal: false,
            image_style: ImageStyle::Blocks,
            notify_clipboard_errors: true,
            notify_picker_cancel: false,
            notification_timeout: Duration::from_millis(10),
            picker_dir: std::env::temp_dir(),
        }
    }

    fn build_app(clipboard: MemoryClipboard) -> TerminalChatApp {
        TerminalChatApp::new(
            Arc::new(ScriptedClient::new(["Hi", "!"])),
            Box::new(clipboard),
            settings(),
        )
    }

    #[test]
    fn test_translate_drops_key_release() {
        let mut release = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(translate(Event::Key(release)), None);
        assert_eq!(translate(Event::FocusGained), None);
        assert_eq!(
            translate(Event::Resize(80, 24)),
            Some(ChatEvent::Resize {
                width: 80,
                height: 24
            })
        );
        let press = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(translate(Event::Key(press)), Some(ChatEvent::Key(press)));
    }

    #[tokio::test]
    async fn test_copy_reports_back_through_inbox() {
        let app = build_app(MemoryClipboard::new());
        let (tx, rx) = async_channel::unbounded();
        let quit = app.execute(
            Effect::Copy {
                text: "answer".to_string(),
                kind: CopyKind::LastResponse,
            },
            &tx,
        );
        assert!(!quit);
        assert_eq!(
            rx.try_recv().unwrap(),
            ChatEvent::Copied(CopyKind::LastResponse)
        );

        let failing = build_app(MemoryClipboard::failing());
        failing.execute(
            Effect::Copy {
                text: "answer".to_string(),
                kind: CopyKind::Highlighted,
            },
            &tx,
        );
        assert!(matches!(rx.try_recv().unwrap(), ChatEvent::CopyFailed(_)));
    }

    #[tokio::test]
    async fn test_schedule_clear_fires_after_delay() {
        let app = build_app(MemoryClipboard::new());
        let (tx, rx) = async_channel::unbounded();
        app.execute(
            Effect::ScheduleClear {
                generation: 7,
                after: Duration::from_millis(5),
            },
            &tx,
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::ClearNotification { generation: 7 }
        );
    }

    #[tokio::test]
    async fn test_stream_effect_feeds_state() {
        let app = build_app(MemoryClipboard::new());
        let (tx, rx) = async_channel::unbounded();
        let mut state = ChatState::new(settings(), vec![], 80, 24);
        state.update(ChatEvent::Paste("Hello".to_string()));
        for effect in state.update(ChatEvent::Key(KeyEvent::new(
            KeyCode::Enter,
            KeyModifiers::NONE,
        ))) {
            assert!(matches!(effect, Effect::StartStream(StreamJob { .. })));
            app.execute(effect, &tx);
        }

        while state.is_streaming() {
            let event = rx.recv().await.unwrap();
            state.update(event);
        }
        assert_eq!(state.history().messages()[1].text, "Hi!");
        assert!(state.mode().is_composing());
        assert!(app.execute(Effect::Quit, &tx));
    }
}
