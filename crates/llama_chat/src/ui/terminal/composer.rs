use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::UnicodeWidthChar;

use super::theme;

/// Width reserved for the "┃ " bar to the left of the text.
const PREFIX_COLS: u16 = 2;
const INPUT_ROWS: u16 = 3;

const PLACEHOLDER: &str = "Type your message here...";
const DISABLED_PLACEHOLDER: &str = "Disabled while response is being streamed...";

/// Prompt input: a title row followed by a few rows of wrapped text.
#[derive(Debug, Clone)]
pub struct Composer {
    text: String,
    /// Byte offset into `text`, always on a char boundary.
    cursor: usize,
    enabled: bool,
    hint: Option<String>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    /// Rows the composer occupies: the title plus the input rows.
    pub const HEIGHT: u16 = INPUT_ROWS + 1;

    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            enabled: true,
            hint: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Short validation message shown in the title row until the next edit.
    pub fn set_hint(&mut self, hint: impl Into<String>) {
        self.hint = Some(hint.into());
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.hint = None;
    }

    pub fn insert_str(&mut self, s: &str) {
        if !self.enabled {
            return;
        }
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
        self.hint = None;
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    /// Apply an editing key. Returns false for keys the composer ignores.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if !self.enabled {
            return false;
        }
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.text.replace_range(prev..self.cursor, "");
                    self.cursor = prev;
                }
            }
            KeyCode::Delete => {
                if let Some(next) = self.next_boundary() {
                    self.text.replace_range(self.cursor..next, "");
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.cursor = prev;
                }
            }
            KeyCode::Right => {
                if let Some(next) = self.next_boundary() {
                    self.cursor = next;
                }
            }
            KeyCode::Home => {
                self.cursor = self.text[..self.cursor].rfind('\n').map_or(0, |i| i + 1);
            }
            KeyCode::End => {
                self.cursor = self.text[self.cursor..]
                    .find('\n')
                    .map_or(self.text.len(), |i| self.cursor + i);
            }
            _ => return false,
        }
        true
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.text[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
    }

    /// Wrap the text into rows of at most `width` columns. Returns the rows
    /// and the (row, column) of the cursor.
    fn layout(&self, width: usize) -> (Vec<String>, (usize, usize)) {
        let width = width.max(1);
        let mut rows = vec![String::new()];
        let mut col = 0;
        let mut cursor = (0, 0);
        for (i, c) in self.text.char_indices() {
            if c == '\n' {
                if i == self.cursor {
                    cursor = (rows.len() - 1, col.min(width - 1));
                }
                rows.push(String::new());
                col = 0;
                continue;
            }
            let w = c.width().unwrap_or(0);
            if col + w > width {
                rows.push(String::new());
                col = 0;
            }
            if i == self.cursor {
                cursor = (rows.len() - 1, col);
            }
            if let Some(row) = rows.last_mut() {
                row.push(c);
            }
            col += w;
        }
        if self.cursor >= self.text.len() {
            if col >= width {
                rows.push(String::new());
                col = 0;
            }
            cursor = (rows.len() - 1, col);
        }
        (rows, cursor)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, title: &str) -> Option<Position> {
        if area.height < 2 || area.width <= PREFIX_COLS {
            return None;
        }
        let accent = if self.enabled { theme::PURPLE } else { theme::GRAY };
        let bar_style = Style::default().fg(accent);

        let mut title_spans = vec![
            Span::styled("┃ ", bar_style),
            Span::styled(
                title.to_string(),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ),
        ];
        if let Some(hint) = &self.hint {
            title_spans.push(Span::styled(
                format!("  {hint}"),
                Style::default().fg(theme::NOTIFICATION),
            ));
        }
        Line::from(title_spans).render(Rect { height: 1, ..area }, buf);

        let text_width = (area.width - PREFIX_COLS) as usize;
        let rows = area.height - 1;
        let (lines, (cursor_row, cursor_col)) = self.layout(text_width);
        let first = (cursor_row + 1).saturating_sub(rows as usize);

        for r in 0..rows {
            let y = area.y + 1 + r;
            buf.set_span(area.x, y, &Span::styled("┃ ", bar_style), PREFIX_COLS);
            let content = if self.text.is_empty() {
                (r == 0).then(|| {
                    let placeholder = if self.enabled {
                        PLACEHOLDER
                    } else {
                        DISABLED_PLACEHOLDER
                    };
                    Span::styled(placeholder, Style::default().fg(theme::GRAY))
                })
            } else {
                lines
                    .get(first + r as usize)
                    .map(|row| Span::styled(row.clone(), Style::default().fg(theme::CREAM)))
            };
            if let Some(span) = content {
                buf.set_span(area.x + PREFIX_COLS, y, &span, area.width - PREFIX_COLS);
            }
        }

        self.enabled.then(|| {
            Position::new(
                area.x + PREFIX_COLS + cursor_col as u16,
                area.y + 1 + (cursor_row - first) as u16,
            )
        })
    }
}
