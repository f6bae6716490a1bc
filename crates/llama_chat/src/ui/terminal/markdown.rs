use std::borrow::Cow;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use tracing::warn;
use tui_markdown as md;
use unicode_width::UnicodeWidthStr;

thread_local! {
    static GUARDED_RENDER: Cell<bool> = const { Cell::new(false) };
}

/// True while a markdown conversion runs under the panic guard. The terminal
/// panic hook uses this to leave the screen alone for panics we recover from.
pub fn in_guarded_render() -> bool {
    GUARDED_RENDER.with(|flag| flag.get())
}

/// Render `source` as markdown wrapped at `width` columns.
///
/// Trailing blank lines are dropped and trailing spaces are trimmed from each
/// line, so the widest returned line is the natural width of the body. If the
/// markdown converter fails the raw text is wrapped instead.
pub fn render_markdown(source: &str, width: usize) -> Vec<Line<'static>> {
    let width = width.clamp(1, u16::MAX as usize);

    GUARDED_RENDER.with(|flag| flag.set(true));
    let rendered = catch_unwind(AssertUnwindSafe(|| render_through_buffer(source, width as u16)));
    GUARDED_RENDER.with(|flag| flag.set(false));

    let mut lines = match rendered {
        Ok(lines) => lines,
        Err(_) => {
            warn!("Markdown rendering failed, falling back to plain text");
            render_plain(source, width)
        }
    };

    for line in &mut lines {
        trim_line_end(line);
    }
    while lines.last().is_some_and(is_blank) {
        lines.pop();
    }
    lines
}

/// Plain wrapped text without any markdown styling.
pub fn render_plain(source: &str, width: usize) -> Vec<Line<'static>> {
    source
        .lines()
        .flat_map(|line| {
            if line.is_empty() {
                vec![Line::from("")]
            } else {
                textwrap::wrap(line, width.max(1))
                    .into_iter()
                    .map(|part| Line::from(part.into_owned()))
                    .collect()
            }
        })
        .collect()
}

/// Drop the last line that opens a code fence when the fences are unbalanced.
/// A half-received fenced block would otherwise swallow the rest of the bubble.
pub fn strip_unterminated_fence(text: &str) -> Cow<'_, str> {
    if text.matches("```").count() % 2 == 0 {
        return Cow::Borrowed(text);
    }
    let mut lines: Vec<&str> = text.split('\n').collect();
    if let Some(pos) = lines.iter().rposition(|line| line.starts_with("```")) {
        lines.remove(pos);
    }
    Cow::Owned(lines.join("\n"))
}

pub fn line_width(line: &Line<'_>) -> usize {
    line.spans.iter().map(|span| span.content.width()).sum()
}

fn render_through_buffer(source: &str, width: u16) -> Vec<Line<'static>> {
    let paragraph = Paragraph::new(md::from_str(source)).wrap(Wrap { trim: false });
    let height = paragraph.line_count(width).clamp(1, u16::MAX as usize) as u16;
    let area = Rect::new(0, 0, width, height);
    let mut tmp = Buffer::empty(area);
    paragraph.render(area, &mut tmp);

    let used_rows = find_used_rows(&tmp, width, height);
    (0..used_rows).map(|y| extract_row(&tmp, y, width)).collect()
}

fn extract_row(buffer: &Buffer, y: u16, width: u16) -> Line<'static> {
    let mut spans = Vec::new();
    let mut current: Option<(Style, String)> = None;

    for x in 0..width {
        let Some(cell) = buffer.cell((x, y)) else {
            continue;
        };
        let symbol = cell.symbol();
        // Wide glyphs leave an empty continuation cell behind them.
        if symbol.is_empty() {
            continue;
        }
        let style = cell.style();
        match current.as_mut() {
            Some((existing, content)) if *existing == style => content.push_str(symbol),
            _ => {
                if let Some((style, content)) = current.take() {
                    spans.push(Span::styled(content, style));
                }
                current = Some((style, symbol.to_string()));
            }
        }
    }
    if let Some((style, content)) = current {
        spans.push(Span::styled(content, style));
    }
    Line::from(spans)
}

fn find_used_rows(buffer: &Buffer, width: u16, height: u16) -> u16 {
    (0..height)
        .rev()
        .find(|&y| {
            (0..width).any(|x| {
                buffer
                    .cell((x, y))
                    .is_some_and(|cell| !cell.symbol().trim().is_empty())
            })
        })
        .map_or(0, |y| y + 1)
}

fn trim_line_end(line: &mut Line<'static>) {
    while let Some(last) = line.spans.last_mut() {
        let trimmed = last.content.trim_end_matches(' ');
        if trimmed.is_empty() {
            line.spans.pop();
        } else {
            if trimmed.len() != last.content.len() {
                last.content = Cow::Owned(trimmed.to_string());
            }
            break;
        }
    }
}

fn is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|span| span.content.trim().is_empty())
}
