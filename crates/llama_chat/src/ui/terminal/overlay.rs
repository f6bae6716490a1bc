//! Layers drawn over the chat: the transient notification box and the help
//! panel.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use super::bubble::{bottom_border, tab_border};
use super::keys::{help_columns, KeyBinding};
use super::theme;

const NOTIFICATION_LABEL: &str = "Notification";

/// At most one notification is shown. Every `show` starts a new generation;
/// a clear request only applies to the generation it was scheduled for.
#[derive(Debug, Default)]
pub struct Notifications {
    active: Option<String>,
    generation: u64,
}

impl Notifications {
    pub fn show(&mut self, text: impl Into<String>) -> u64 {
        self.generation += 1;
        self.active = Some(text.into());
        self.generation
    }

    /// Clear the notification if `generation` is still the current one.
    pub fn clear(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.active.is_none() {
            return false;
        }
        self.active = None;
        true
    }

    pub fn text(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

/// Bordered box in the top right corner of `area`.
pub fn render_notification(text: &str, area: Rect, buf: &mut Buffer) {
    let width = (text.width() as u16 + 6)
        .max(NOTIFICATION_LABEL.width() as u16 + 8)
        .min(area.width);
    let height = 5u16.min(area.height);
    if width < 2 || height < 2 {
        return;
    }
    let rect = Rect::new(area.right() - width, area.y, width, height);
    Clear.render(rect, buf);

    let color = theme::NOTIFICATION;
    let border = Style::default().fg(color);
    let inner = width as usize - 2;
    let row = |content: &str| {
        let pad = inner.saturating_sub(content.width() + 2);
        Line::from(vec![
            Span::styled("│", border),
            Span::raw("  "),
            Span::styled(content.to_string(), Style::default().fg(theme::CREAM)),
            Span::raw(" ".repeat(pad)),
            Span::styled("│", border),
        ])
    };

    let mut lines = vec![tab_border(NOTIFICATION_LABEL, width, color), row(""), row(text)];
    lines.push(row(""));
    lines.push(bottom_border(width, color));
    for (i, line) in lines.into_iter().take(height as usize).enumerate() {
        line.render(
            Rect::new(rect.x, rect.y + i as u16, rect.width, 1),
            buf,
        );
    }
}

/// Full screen help: the frame underneath is dimmed and a panel covering 80%
/// of the screen lists the key bindings.
pub fn render_help(area: Rect, buf: &mut Buffer, multimodal: bool) {
    dim_area(area, buf);

    let panel = Rect::new(
        area.x + area.width / 10,
        area.y + area.height / 10,
        area.width * 8 / 10,
        area.height * 8 / 10,
    );
    if panel.width < 4 || panel.height < 3 {
        return;
    }
    Clear.render(panel, buf);
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::PURPLE));
    let inner = block.inner(panel);
    block.render(panel, buf);

    let (left, right) = help_columns(multimodal);
    let mut lines = vec![
        Line::from(Span::styled(" Help Menu ", theme::tab_style(theme::PURPLE))),
        Line::from(""),
    ];
    lines.extend(binding_rows(&left, &right));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Press ", Style::default().fg(theme::CREAM)),
        Span::styled(" ctrl+h ", theme::tab_style(theme::PURPLE)),
        Span::styled(" to close this menu", Style::default().fg(theme::CREAM)),
    ]));

    let top = inner.height.saturating_sub(lines.len() as u16) / 2;
    let body = Rect {
        y: inner.y + top,
        height: inner.height - top,
        ..inner
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(body, buf);
}

fn binding_rows(left: &[KeyBinding], right: &[KeyBinding]) -> Vec<Line<'static>> {
    let key_width = |col: &[KeyBinding]| col.iter().map(|b| b.keys.width()).max().unwrap_or(0);
    let desc_width =
        |col: &[KeyBinding]| col.iter().map(|b| b.description.width()).max().unwrap_or(0);
    let (lk, ld) = (key_width(left), desc_width(left));
    let (rk, rd) = (key_width(right), desc_width(right));

    let cell = |binding: Option<&KeyBinding>, kw: usize, dw: usize| -> Vec<Span<'static>> {
        match binding {
            Some(b) => vec![
                Span::styled(format!("{:<kw$}", b.keys), theme::hint_key_style()),
                Span::styled(
                    format!(" {:<dw$}", b.description),
                    Style::default().fg(theme::GRAY),
                ),
            ],
            None => vec![Span::raw(" ".repeat(kw + dw + 1))],
        }
    };

    (0..left.len().max(right.len()))
        .map(|i| {
            let mut spans = cell(left.get(i), lk, ld);
            spans.push(Span::raw("    "));
            spans.extend(cell(right.get(i), rk, rd));
            Line::from(spans)
        })
        .collect()
}

fn dim_area(area: Rect, buf: &mut Buffer) {
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.fg = theme::dim_color(cell.fg, Color::DarkGray);
                cell.bg = theme::dim_color(cell.bg, Color::Black);
            }
        }
    }
}
