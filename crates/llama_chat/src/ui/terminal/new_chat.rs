//! Form shown before a fresh chat starts: title, optional system message and
//! whether the chat is saved.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Margin, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Widget},
};
use tracing::debug;

use super::composer::Composer;
use super::theme;
use super::tui;

const TITLE_REQUIRED: &str = "Chat title cannot be empty";
const FORM_WIDTH: u16 = 72;
const FORM_HEIGHT: u16 = 16;
const SYSTEM_ROWS: u16 = 4;

/// Values collected by the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewChatInput {
    pub title: String,
    pub system_message: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    SystemMessage,
    Anonymous,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Title => Field::SystemMessage,
            Field::SystemMessage => Field::Anonymous,
            Field::Anonymous => Field::Title,
        }
    }

    fn previous(self) -> Self {
        match self {
            Field::Title => Field::Anonymous,
            Field::SystemMessage => Field::Title,
            Field::Anonymous => Field::SystemMessage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Pending,
    Submitted(NewChatInput),
    Cancelled,
}

pub struct NewChatForm {
    title: Composer,
    system_message: Composer,
    is_anonymous: bool,
    focus: Field,
}

impl NewChatForm {
    /// A form prefilled with `defaults`.
    pub fn new(defaults: NewChatInput) -> Self {
        let mut title = Composer::new();
        title.insert_str(&defaults.title);
        let mut system_message = Composer::new();
        system_message.insert_str(&defaults.system_message);
        Self {
            title,
            system_message,
            is_anonymous: defaults.is_anonymous,
            focus: Field::Title,
        }
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn title_error(&self) -> Option<&str> {
        self.title.hint()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Esc => return FormOutcome::Cancelled,
            KeyCode::Char('c') if ctrl => return FormOutcome::Cancelled,
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.previous(),
            KeyCode::Enter if alt && self.focus == Field::SystemMessage => {
                self.system_message.insert_str("\n");
            }
            KeyCode::Enter => match self.focus {
                Field::Title => {
                    if self.validate_title() {
                        self.focus = Field::SystemMessage;
                    }
                }
                Field::SystemMessage => self.focus = Field::Anonymous,
                Field::Anonymous => return self.submit(),
            },
            _ => match self.focus {
                Field::Title => {
                    self.title.handle_key(key);
                }
                Field::SystemMessage => {
                    self.system_message.handle_key(key);
                }
                Field::Anonymous => match key.code {
                    KeyCode::Char('y' | 'Y') => self.is_anonymous = true,
                    KeyCode::Char('n' | 'N') => self.is_anonymous = false,
                    KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                        self.is_anonymous = !self.is_anonymous
                    }
                    _ => {}
                },
            },
        }
        FormOutcome::Pending
    }

    fn validate_title(&mut self) -> bool {
        if self.title.text().trim().is_empty() {
            self.title.set_hint(TITLE_REQUIRED);
            return false;
        }
        true
    }

    fn submit(&mut self) -> FormOutcome {
        if !self.validate_title() {
            debug!("New chat form submitted without a title");
            self.focus = Field::Title;
            return FormOutcome::Pending;
        }
        FormOutcome::Submitted(NewChatInput {
            title: self.title.text().trim().to_string(),
            system_message: self.system_message.text().trim().to_string(),
            is_anonymous: self.is_anonymous,
        })
    }

    /// Draw the form centered in `area`. Returns the cursor of the focused
    /// text field.
    pub fn render(&self, area: Rect, buf: &mut Buffer) -> Option<Position> {
        let width = FORM_WIDTH.min(area.width);
        let height = FORM_HEIGHT.min(area.height);
        let form = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::PURPLE))
            .title(Line::from(Span::styled(
                " New chat ",
                theme::tab_style(theme::PURPLE),
            )));
        let inner = block.inner(form);
        block.render(form, buf);

        let [title, _, system, _, anonymous, _, hints] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(SYSTEM_ROWS + 1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner.inner(Margin::new(1, 0)));

        let title_cursor = self.title.render(title, buf, "Chat title");
        let system_cursor = self.system_message.render(
            system,
            buf,
            "System message (optional, leave empty for none)",
        );
        self.render_anonymous(anonymous, buf);
        hint_line(self.focus).render(hints, buf);

        match self.focus {
            Field::Title => title_cursor,
            Field::SystemMessage => system_cursor,
            Field::Anonymous => None,
        }
    }

    fn render_anonymous(&self, area: Rect, buf: &mut Buffer) {
        let focused = self.focus == Field::Anonymous;
        let accent = if focused { theme::PURPLE } else { theme::GRAY };
        let bar = Span::styled("┃ ", Style::default().fg(accent));
        Line::from(vec![
            bar.clone(),
            Span::styled(
                "Anonymous chat",
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  messages are not saved", Style::default().fg(theme::GRAY)),
        ])
        .render(Rect { height: 1, ..area }, buf);

        let option = |label: &'static str, chosen: bool| {
            if chosen {
                Span::styled(format!(" {label} "), theme::tab_style(theme::TEAL))
            } else {
                Span::styled(format!(" {label} "), Style::default().fg(theme::GRAY))
            }
        };
        Line::from(vec![
            bar,
            option("Yes", self.is_anonymous),
            Span::raw(" "),
            option("No", !self.is_anonymous),
        ])
        .render(
            Rect {
                y: area.y + 1,
                height: 1,
                ..area
            },
            buf,
        );
    }
}

fn hint_line(focus: Field) -> Line<'static> {
    let mut hints = vec![("tab", "next field"), ("enter", "confirm")];
    match focus {
        Field::SystemMessage => hints.push(("alt+enter", "new line")),
        Field::Anonymous => hints.push(("←/→", "toggle")),
        Field::Title => {}
    }
    hints.push(("esc", "cancel"));

    let mut spans = Vec::new();
    for (i, (keys, description)) in hints.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", theme::hint_text_style()));
        }
        spans.push(Span::styled(keys, theme::hint_key_style()));
        spans.push(Span::styled(format!(" {description}"), theme::hint_text_style()));
    }
    Line::from(spans)
}

/// Show the form full screen until it is submitted or cancelled. Returns
/// `None` when the user backed out.
pub async fn run_new_chat_form(defaults: NewChatInput) -> anyhow::Result<Option<NewChatInput>> {
    let mut terminal = tui::init()?;
    let result = form_loop(&mut terminal, NewChatForm::new(defaults)).await;
    tui::restore()?;
    result
}

async fn form_loop(
    terminal: &mut tui::Terminal,
    mut form: NewChatForm,
) -> anyhow::Result<Option<NewChatInput>> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|frame| {
            if let Some(cursor) = form.render(frame.area(), frame.buffer_mut()) {
                frame.set_cursor_position(cursor);
            }
        })?;

        let Some(event) = events.next().await else {
            return Ok(None);
        };
        let key = match event? {
            Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
                key
            }
            Event::Paste(text) => {
                match form.focus {
                    Field::Title => form.title.insert_str(&text),
                    Field::SystemMessage => form.system_message.insert_str(&text),
                    Field::Anonymous => {}
                }
                continue;
            }
            _ => continue,
        };
        match form.handle_key(key) {
            FormOutcome::Pending => {}
            FormOutcome::Submitted(input) => {
                debug!("New chat '{}' configured", input.title);
                return Ok(Some(input));
            }
            FormOutcome::Cancelled => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn press(form: &mut NewChatForm, code: KeyCode) -> FormOutcome {
        form.handle_key(key(code, KeyModifiers::NONE))
    }

    fn type_text(form: &mut NewChatForm, text: &str) {
        for c in text.chars() {
            press(form, KeyCode::Char(c));
        }
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let mut form = NewChatForm::new(NewChatInput::default());
        type_text(&mut form, "   ");
        assert_eq!(press(&mut form, KeyCode::Enter), FormOutcome::Pending);
        assert_eq!(form.focus(), Field::Title);
        assert_eq!(form.title_error(), Some(TITLE_REQUIRED));

        // Skipping ahead and submitting still lands back on the title.
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Tab);
        assert_eq!(form.focus(), Field::Anonymous);
        assert_eq!(press(&mut form, KeyCode::Enter), FormOutcome::Pending);
        assert_eq!(form.focus(), Field::Title);
    }

    #[test]
    fn test_filled_form_is_submitted() {
        let mut form = NewChatForm::new(NewChatInput::default());
        type_text(&mut form, " Rust questions ");
        assert_eq!(press(&mut form, KeyCode::Enter), FormOutcome::Pending);
        assert_eq!(form.focus(), Field::SystemMessage);
        assert_eq!(form.title_error(), None);

        type_text(&mut form, "Be brief.");
        form.handle_key(key(KeyCode::Enter, KeyModifiers::ALT));
        type_text(&mut form, "Use examples.");
        press(&mut form, KeyCode::Enter);
        assert_eq!(form.focus(), Field::Anonymous);

        press(&mut form, KeyCode::Char('y'));
        assert_eq!(
            press(&mut form, KeyCode::Enter),
            FormOutcome::Submitted(NewChatInput {
                title: "Rust questions".to_string(),
                system_message: "Be brief.\nUse examples.".to_string(),
                is_anonymous: true,
            })
        );
    }

    #[test]
    fn test_defaults_prefill_and_toggle() {
        let mut form = NewChatForm::new(NewChatInput {
            title: String::new(),
            system_message: "You are terse.".to_string(),
            is_anonymous: true,
        });
        press(&mut form, KeyCode::BackTab);
        assert_eq!(form.focus(), Field::Anonymous);
        press(&mut form, KeyCode::Left);
        press(&mut form, KeyCode::Up);
        press(&mut form, KeyCode::Up);
        type_text(&mut form, "Notes");
        press(&mut form, KeyCode::Down);
        press(&mut form, KeyCode::Down);

        let FormOutcome::Submitted(input) = press(&mut form, KeyCode::Enter) else {
            panic!("expected the form to submit");
        };
        assert_eq!(input.title, "Notes");
        assert_eq!(input.system_message, "You are terse.");
        assert!(!input.is_anonymous);
    }

    #[test]
    fn test_escape_cancels() {
        let mut form = NewChatForm::new(NewChatInput::default());
        type_text(&mut form, "half done");
        assert_eq!(press(&mut form, KeyCode::Esc), FormOutcome::Cancelled);
        assert_eq!(
            form.handle_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            FormOutcome::Cancelled
        );
    }

    #[test]
    fn test_render_shows_fields_and_cursor() {
        let mut form = NewChatForm::new(NewChatInput::default());
        type_text(&mut form, "Hi");
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        let cursor = form.render(area, &mut buf);

        let screen: Vec<String> = (0..area.height).map(|y| row_text(&buf, y)).collect();
        assert!(screen.iter().any(|row| row.contains("New chat")));
        assert!(screen.iter().any(|row| row.contains("Chat title")));
        assert!(screen.iter().any(|row| row.contains("System message")));
        assert!(screen.iter().any(|row| row.contains("Anonymous chat")));
        let title_row = screen.iter().position(|row| row.contains("Chat title")).unwrap();
        let cursor = cursor.unwrap();
        assert_eq!(cursor.y as usize, title_row + 1);
        assert_eq!(buf[(cursor.x - 2, cursor.y)].symbol(), "H");
        assert_eq!(buf[(cursor.x - 1, cursor.y)].symbol(), "i");
    }
}
