//! Chat screen state machine.
//!
//! All input and background results arrive as [`ChatEvent`]s and are applied
//! by [`ChatState::update`], which returns the [`Effect`]s the event loop has
//! to carry out. Nothing in here blocks or touches the terminal.

use std::path::PathBuf;
use std::time::Duration;

use derive_more::IsVariant;
use ratatui::crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use tracing::{debug, info, trace, warn};

use super::composer::Composer;
use super::events::{ChatEvent, CopyKind, Effect, StreamJob};
use super::history::{HistoryLayout, MessageHistory};
use super::image_picker::{ImagePicker, PickerOutcome};
use super::keys::{classify, KeyAction};
use super::overlay::Notifications;
use super::viewport::{viewport_height, HitMap, Viewport};
use crate::config::{Config, ImageStyle};
use crate::session::SessionMeta;
use crate::types::{Message, Role};

const WHEEL_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Mode {
    Composing,
    Streaming,
    PickingImage,
    HelpOverlay,
    Terminal,
}

/// Per-run settings taken from the session and the configuration.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model_name: String,
    pub title: String,
    pub system_message: String,
    pub multimodal: bool,
    pub image_style: ImageStyle,
    pub notify_clipboard_errors: bool,
    pub notify_picker_cancel: bool,
    pub notification_timeout: Duration,
    /// Where the image picker starts browsing.
    pub picker_dir: PathBuf,
}

impl ChatSettings {
    pub fn new(meta: &SessionMeta, config: &Config) -> Self {
        Self {
            model_name: meta.model_name.clone(),
            title: meta.title.clone(),
            system_message: meta.system_message.clone(),
            multimodal: meta.is_multi_modal,
            image_style: config.image_style,
            notify_clipboard_errors: config.notify_clipboard_errors,
            notify_picker_cancel: config.notify_picker_cancel,
            notification_timeout: config.notification_timeout(),
            picker_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

pub struct ChatState {
    settings: ChatSettings,
    history: MessageHistory,
    viewport: Viewport,
    composer: Composer,
    notifications: Notifications,
    /// Kept across openings so the picker remembers its directory.
    picker: Option<ImagePicker>,
    picking: bool,
    help_visible: bool,
    streaming: bool,
    quit: bool,
    attachment: Option<PathBuf>,
    size: (u16, u16),
    hit_map: HitMap,
}

fn layout_for(width: u16, height: u16) -> HistoryLayout {
    HistoryLayout {
        available_width: width.saturating_sub(2),
        viewport_height: viewport_height(height, Composer::HEIGHT),
    }
}

impl ChatState {
    pub fn new(settings: ChatSettings, messages: Vec<Message>, width: u16, height: u16) -> Self {
        let layout = layout_for(width, height);
        let history = MessageHistory::new(
            messages,
            settings.model_name.clone(),
            layout,
            settings.image_style,
        );
        let mut viewport = Viewport::new(layout.viewport_height);
        viewport.scroll_to_bottom(history.total_height());
        Self {
            settings,
            history,
            viewport,
            composer: Composer::new(),
            notifications: Notifications::default(),
            picker: None,
            picking: false,
            help_visible: false,
            streaming: false,
            quit: false,
            attachment: None,
            size: (width, height),
            hit_map: HitMap::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        if self.quit {
            Mode::Terminal
        } else if self.help_visible {
            Mode::HelpOverlay
        } else if self.picking {
            Mode::PickingImage
        } else if self.streaming {
            Mode::Streaming
        } else {
            Mode::Composing
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn notification(&self) -> Option<&str> {
        self.notifications.text()
    }

    pub fn attachment(&self) -> Option<&PathBuf> {
        self.attachment.as_ref()
    }

    /// The picker, while it is open.
    pub fn picker(&self) -> Option<&ImagePicker> {
        self.picker.as_ref().filter(|_| self.picking)
    }

    pub fn help_visible(&self) -> bool {
        self.help_visible
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// Record where bubbles were drawn in the last frame.
    pub fn set_hit_map(&mut self, hit_map: HitMap) {
        self.hit_map = hit_map;
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.history.into_messages()
    }

    pub fn update(&mut self, event: ChatEvent) -> Vec<Effect> {
        match event {
            ChatEvent::Key(key) => self.on_key(key),
            ChatEvent::Paste(text) => {
                if self.mode().is_composing() {
                    self.composer.insert_str(&text);
                }
                Vec::new()
            }
            ChatEvent::Mouse(mouse) => self.on_mouse(mouse),
            ChatEvent::Resize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            ChatEvent::StreamChunk(delta) => {
                if !self.streaming {
                    debug!("Ignoring chunk outside of a stream");
                    return Vec::new();
                }
                self.history.stream_append(&delta);
                self.viewport.scroll_to_bottom(self.history.total_height());
                Vec::new()
            }
            ChatEvent::StreamFinished => {
                self.finish_stream();
                Vec::new()
            }
            ChatEvent::StreamFailed(error) => {
                warn!("Response stream failed: {error}");
                self.finish_stream();
                self.notify(format!("Error: {error}"))
            }
            ChatEvent::ClearNotification { generation } => {
                self.notifications.clear(generation);
                Vec::new()
            }
            ChatEvent::Copied(kind) => self.notify(kind.confirmation()),
            ChatEvent::CopyFailed(error) => {
                warn!("Clipboard write failed: {error}");
                if self.settings.notify_clipboard_errors {
                    self.notify(format!("Failed to copy: {error}"))
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let action = classify(key);
        if action.is_quit() {
            info!("Quit requested");
            self.quit = true;
            return vec![Effect::Quit];
        }
        if self.help_visible {
            if action.is_toggle_help() {
                self.help_visible = false;
            }
            return Vec::new();
        }
        if self.picking {
            return self.on_picker_key(action, key);
        }
        if action.is_toggle_help() {
            self.help_visible = true;
            return Vec::new();
        }
        if self.streaming && !action.allowed_while_streaming() {
            trace!("Ignoring {action:?} while streaming");
            return Vec::new();
        }

        match action {
            KeyAction::PreviousMessage => self.navigate(-1),
            KeyAction::NextMessage => self.navigate(1),
            KeyAction::HalfPageUp => self.viewport.half_page_up(),
            KeyAction::HalfPageDown => self.viewport.half_page_down(self.history.total_height()),
            KeyAction::LineUp => self.viewport.line_up(1),
            KeyAction::LineDown => self.viewport.line_down(1, self.history.total_height()),
            KeyAction::CopyHighlighted => return self.copy_highlighted(),
            KeyAction::CopyLastResponse => {
                return match self.history.last_response() {
                    Some(text) => vec![Effect::Copy {
                        text: text.to_string(),
                        kind: CopyKind::LastResponse,
                    }],
                    None => Vec::new(),
                };
            }
            KeyAction::ToggleImagePicker => self.open_picker(),
            KeyAction::RemoveAttachment => {
                if let Some(path) = self.attachment.take() {
                    debug!("Removed attachment {}", path.display());
                }
            }
            KeyAction::Submit => return self.submit(),
            KeyAction::Newline => self.composer.insert_str("\n"),
            KeyAction::Input(key) => {
                self.composer.handle_key(key);
            }
            KeyAction::Quit | KeyAction::ToggleHelp => {}
        }
        Vec::new()
    }

    /// The picker sees raw keys; only the toggle and help bindings are kept.
    fn on_picker_key(&mut self, action: KeyAction, key: KeyEvent) -> Vec<Effect> {
        match action {
            KeyAction::ToggleImagePicker => {
                self.picking = false;
                debug!("Image picker cancelled");
                if self.settings.notify_picker_cancel {
                    return self.notify("No image selected");
                }
            }
            KeyAction::ToggleHelp => self.help_visible = true,
            _ => {
                let Some(picker) = self.picker.as_mut() else {
                    self.picking = false;
                    return Vec::new();
                };
                if let PickerOutcome::Selected(path) = picker.handle_key(key) {
                    info!("Attached image {}", path.display());
                    self.attachment = Some(path);
                    self.picking = false;
                }
            }
        }
        Vec::new()
    }

    fn open_picker(&mut self) {
        if !self.settings.multimodal {
            debug!("Image picker is only available for multimodal sessions");
            return;
        }
        match self.picker.as_mut() {
            Some(picker) => picker.refresh(),
            None => self.picker = Some(ImagePicker::new(self.settings.picker_dir.clone())),
        }
        self.picking = true;
    }

    fn navigate(&mut self, delta: isize) {
        self.history.navigate(delta);
        let offset = self.history.offset_of(self.history.highlighted());
        self.viewport.scroll_to(offset, self.history.total_height());
    }

    fn copy_highlighted(&self) -> Vec<Effect> {
        match self.history.highlighted_message() {
            Some(message) if !message.text.is_empty() => vec![Effect::Copy {
                text: message.text.clone(),
                kind: CopyKind::Highlighted,
            }],
            _ => Vec::new(),
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        let text = self.composer.text().trim().to_string();
        if text.is_empty() {
            debug!("Rejected empty prompt");
            self.composer.set_hint("Message is empty");
            return Vec::new();
        }

        let images = self
            .attachment
            .take()
            .map(|path| vec![path.to_string_lossy().into_owned()])
            .unwrap_or_default();
        self.history.append(Message::new(Role::User, text, images));
        let job = StreamJob {
            model: self.settings.model_name.clone(),
            system_message: self.settings.system_message.clone(),
            history: self.history.messages().to_vec(),
        };
        self.history.begin_response();

        self.composer.clear();
        self.composer.set_enabled(false);
        self.streaming = true;
        self.viewport.scroll_to_bottom(self.history.total_height());
        info!("Submitted prompt, {} messages in history", job.history.len());
        vec![Effect::StartStream(job)]
    }

    fn finish_stream(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        self.history.close_stream();
        self.attachment = None;
        self.composer.set_enabled(true);
        self.viewport.scroll_to_bottom(self.history.total_height());
        debug!("Response stream closed");
    }

    fn on_mouse(&mut self, mouse: MouseEvent) -> Vec<Effect> {
        if self.help_visible || self.picking {
            return Vec::new();
        }
        match mouse.kind {
            MouseEventKind::ScrollUp => self.viewport.line_up(WHEEL_LINES),
            MouseEventKind::ScrollDown => self
                .viewport
                .line_down(WHEEL_LINES, self.history.total_height()),
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(index) = self.hit_map.hit(mouse.column, mouse.row) {
                    self.history.highlight(index);
                }
            }
            MouseEventKind::Up(MouseButton::Right) => return self.copy_highlighted(),
            _ => {}
        }
        Vec::new()
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
        let layout = layout_for(width, height);
        self.history.set_layout(layout);
        self.viewport
            .set_height(layout.viewport_height, self.history.total_height());
        self.viewport.scroll_to_bottom(self.history.total_height());
    }

    fn notify(&mut self, text: impl Into<String>) -> Vec<Effect> {
        let generation = self.notifications.show(text);
        vec![Effect::ScheduleClear {
            generation,
            after: self.settings.notification_timeout,
        }]
    }
}
