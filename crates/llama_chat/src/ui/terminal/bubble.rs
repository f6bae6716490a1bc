//! A single chat message drawn as a bordered bubble.
//!
//! ```text
//! ╭───── llama3 ─────╮
//! │ rendered body    │
//! ╰──────────────────╯
//! ```
//!
//! User bubbles hug the right edge of the transcript, everything else the left.

use std::borrow::Cow;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

use super::image_art::ImageArtCache;
use super::markdown::{line_width, render_markdown, strip_unterminated_fence};
use super::theme;
use crate::types::{Message, Role};

const LEFT_HALF_CIRCLE: &str = "\u{e0b6}";
const RIGHT_HALF_CIRCLE: &str = "\u{e0b4}";

/// Terminals at least this wide get half-width bubbles.
const WIDE_TERMINAL: u16 = 80;
const NARROW_MARGIN: u16 = 6;

pub const IMAGE_LOAD_FAILED: &str = "Failed to load image";

/// Layout inputs shared by every bubble in a render pass.
#[derive(Debug, Clone, Copy)]
pub struct BubbleContext<'a> {
    /// Columns available inside the transcript border.
    pub available_width: u16,
    pub viewport_height: u16,
    pub model_name: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    /// Rows ready to draw, already offset for alignment.
    pub lines: Vec<Line<'static>>,
    /// First column of the border, relative to the transcript.
    pub x: u16,
    /// Width including the border.
    pub width: u16,
}

impl Bubble {
    pub fn height(&self) -> usize {
        self.lines.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Padding {
    top: u16,
    left: u16,
    right: u16,
}

impl Padding {
    const TEXT: Padding = Padding {
        top: 0,
        left: 1,
        right: 1,
    };
    const IMAGE: Padding = Padding {
        top: 1,
        left: 2,
        right: 2,
    };

    /// Border plus horizontal padding.
    fn margin(&self) -> u16 {
        2 + self.left + self.right
    }
}

/// Preferred outer width of a bubble before it is fitted to its content.
pub fn target_width(available: u16) -> u16 {
    if available >= WIDE_TERMINAL {
        available / 2
    } else {
        available.saturating_sub(NARROW_MARGIN)
    }
}

pub fn label_for<'a>(role: Role, model_name: &'a str) -> &'a str {
    match role {
        Role::Assistant => model_name,
        Role::User => "user",
        Role::System => "system",
    }
}

pub fn render_bubble(
    message: &Message,
    selected: bool,
    streaming: bool,
    ctx: &BubbleContext<'_>,
    images: &mut ImageArtCache,
) -> Bubble {
    let label = label_for(message.role, ctx.model_name);
    let body = body_source(message, streaming, ctx.model_name);

    let padding = if message.images.is_empty() {
        Padding::TEXT
    } else {
        Padding::IMAGE
    };
    let target = target_width(ctx.available_width);
    let wrap = target.saturating_sub(padding.margin()).max(1);

    let body_lines = render_markdown(&body, wrap as usize);
    let mut content = image_lines(message, &body_lines, wrap, ctx.viewport_height, images);
    if !content.is_empty() && !body_lines.is_empty() {
        content.push(Line::from(""));
    }
    content.extend(body_lines);

    let natural = content.iter().map(line_width).max().unwrap_or(0) as u16;
    let label_width = label.width() as u16;
    let width = (natural + padding.margin())
        .max(label_width + 6)
        .min(target.max(padding.margin() + 1))
        .min(ctx.available_width);

    let color = if selected {
        theme::TEAL
    } else {
        theme::role_color(message.role)
    };
    let center = message.role == Role::User && content.len() == 1;

    let mut lines = Vec::with_capacity(content.len() + 2 + padding.top as usize);
    lines.push(tab_border(label, width, color));
    for _ in 0..padding.top {
        lines.push(body_row(Vec::new(), width, padding, color, false));
    }
    for line in content {
        lines.push(body_row(line.spans, width, padding, color, center));
    }
    lines.push(bottom_border(width, color));

    let x = match message.role {
        Role::User => ctx.available_width.saturating_sub(width),
        _ => 0,
    };
    let lines = lines
        .into_iter()
        .map(|line| {
            let (mut spans, _) = truncate_spans(line.spans, ctx.available_width as usize);
            if x > 0 {
                spans.insert(0, Span::raw(" ".repeat(x as usize)));
            }
            Line::from(spans)
        })
        .collect();

    Bubble { lines, x, width }
}

fn body_source<'a>(message: &'a Message, streaming: bool, model_name: &str) -> Cow<'a, str> {
    if message.role == Role::Assistant && message.text.is_empty() {
        return Cow::Owned(format!("_Waiting for {model_name}..._"));
    }
    if streaming {
        strip_unterminated_fence(&message.text)
    } else {
        Cow::Borrowed(message.text.as_str())
    }
}

fn image_lines(
    message: &Message,
    body_lines: &[Line<'static>],
    wrap: u16,
    viewport_height: u16,
    images: &mut ImageArtCache,
) -> Vec<Line<'static>> {
    let max_height = viewport_height
        .saturating_sub(body_lines.len() as u16 + 4)
        .max(3);
    let mut out = Vec::new();
    for path in &message.images {
        match images.get(path, wrap, max_height) {
            Some(art) => out.extend(art.lines.iter().cloned()),
            None => out.push(Line::from(IMAGE_LOAD_FAILED)),
        }
    }
    out
}

/// Top border with `label` in a rounded tab at its center. The tab is left
/// out when it does not fit.
pub fn tab_border(label: &str, width: u16, color: Color) -> Line<'static> {
    let border = Style::default().fg(color);
    let inner = width.saturating_sub(2) as usize;
    let tab_width = label.width() + 4;

    let mut spans = vec![Span::styled("╭", border)];
    if tab_width <= inner {
        let left = (inner - tab_width) / 2;
        let right = inner - tab_width - left;
        spans.push(Span::styled("─".repeat(left), border));
        spans.push(Span::styled(LEFT_HALF_CIRCLE, border));
        spans.push(Span::styled(format!(" {label} "), theme::tab_style(color)));
        spans.push(Span::styled(RIGHT_HALF_CIRCLE, border));
        spans.push(Span::styled("─".repeat(right), border));
    } else {
        spans.push(Span::styled("─".repeat(inner), border));
    }
    spans.push(Span::styled("╮", border));
    Line::from(spans)
}

pub fn bottom_border(width: u16, color: Color) -> Line<'static> {
    let inner = width.saturating_sub(2) as usize;
    Line::from(Span::styled(
        format!("╰{}╯", "─".repeat(inner)),
        Style::default().fg(color),
    ))
}

fn body_row(
    spans: Vec<Span<'static>>,
    width: u16,
    padding: Padding,
    color: Color,
    center: bool,
) -> Line<'static> {
    let border = Style::default().fg(color);
    let text_width = width.saturating_sub(padding.margin()) as usize;
    let base = Style::default().fg(theme::CREAM);

    let spans = spans
        .into_iter()
        .map(|span| Span::styled(span.content, base.patch(span.style)))
        .collect();
    let (content, used) = truncate_spans(spans, text_width);
    let free = text_width - used;
    let (before, after) = if center {
        (free / 2, free - free / 2)
    } else {
        (0, free)
    };

    let mut row = Vec::with_capacity(content.len() + 4);
    row.push(Span::styled("│", border));
    row.push(Span::raw(" ".repeat(padding.left as usize + before)));
    row.extend(content);
    row.push(Span::raw(" ".repeat(after + padding.right as usize)));
    row.push(Span::styled("│", border));
    Line::from(row)
}

/// Cut `spans` to at most `max` display columns. Returns the kept spans and
/// their width.
fn truncate_spans(spans: Vec<Span<'static>>, max: usize) -> (Vec<Span<'static>>, usize) {
    let mut used = 0;
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let width = span.content.width();
        if used + width <= max {
            used += width;
            out.push(span);
            continue;
        }
        let mut cut = String::new();
        for ch in span.content.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > max {
                break;
            }
            used += w;
            cut.push(ch);
        }
        if !cut.is_empty() {
            out.push(Span::styled(cut, span.style));
        }
        break;
    }
    (out, used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageStyle;

    fn ctx(width: u16) -> BubbleContext<'static> {
        BubbleContext {
            available_width: width,
            viewport_height: 30,
            model_name: "llama3",
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(message: &Message, width: u16) -> Bubble {
        let mut cache = ImageArtCache::new(ImageStyle::Blocks);
        render_bubble(message, false, false, &ctx(width), &mut cache)
    }

    #[test]
    fn test_target_width_policy() {
        assert_eq!(target_width(120), 60);
        assert_eq!(target_width(80), 40);
        assert_eq!(target_width(79), 73);
        assert_eq!(target_width(3), 0);
    }

    #[test]
    fn test_short_user_message_is_tight_and_right_aligned() {
        let message = Message::new(Role::User, "Hello", vec![]);
        let bubble = render(&message, 100);

        // Label "user" needs 4 + 6 columns, more than the body.
        assert_eq!(bubble.width, 10);
        assert_eq!(bubble.x, 90);
        assert_eq!(bubble.height(), 3);
        let top = text(&bubble.lines[0]);
        assert!(top.trim_start().starts_with('╭'));
        assert!(top.contains(" user "));
        assert!(text(&bubble.lines[1]).contains("Hello"));
        assert!(text(&bubble.lines[2]).trim_start().starts_with('╰'));
    }

    #[test]
    fn test_assistant_placeholder_uses_model_name() {
        let message = Message::new(Role::Assistant, "", vec![]);
        let bubble = render(&message, 100);
        assert_eq!(bubble.x, 0);
        assert!(text(&bubble.lines[0]).contains(" llama3 "));
        assert!(text(&bubble.lines[1]).contains("Waiting for llama3..."));
    }

    #[test]
    fn test_long_message_wraps_at_target_width() {
        let message = Message::new(Role::Assistant, "word ".repeat(200), vec![]);
        let bubble = render(&message, 100);
        assert!(bubble.width <= 50 && bubble.width > 40);
        assert!(bubble.height() > 10);
        for line in &bubble.lines {
            assert_eq!(line_width(line), bubble.width as usize);
        }
    }

    #[test]
    fn test_width_never_exceeds_available() {
        let bodies = ["", "x", &"lorem ipsum dolor ".repeat(300)];
        for body in bodies {
            for role in [Role::User, Role::Assistant] {
                let message = Message::new(role, body, vec![]);
                for width in [0u16, 1, 2, 5, 9, 20, 79, 80, 81, 200] {
                    let bubble = render(&message, width);
                    for line in &bubble.lines {
                        assert!(
                            line_width(line) <= width as usize,
                            "width {width} exceeded by {:?}",
                            text(line)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_selected_bubble_uses_highlight_color() {
        let message = Message::new(Role::Assistant, "hi", vec![]);
        let mut cache = ImageArtCache::new(ImageStyle::Blocks);
        let bubble = render_bubble(&message, true, false, &ctx(100), &mut cache);
        assert_eq!(bubble.lines[0].spans[0].style.fg, Some(theme::TEAL));

        let plain = render(&message, 100);
        assert_eq!(plain.lines[0].spans[0].style.fg, Some(theme::LAVENDER));
    }

    #[test]
    fn test_streaming_hides_unterminated_fence() {
        let message = Message::new(Role::Assistant, "Look:\n```\nlet x = 1;", vec![]);
        let mut cache = ImageArtCache::new(ImageStyle::Blocks);
        let bubble = render_bubble(&message, false, true, &ctx(100), &mut cache);
        let all: String = bubble.lines.iter().map(text).collect();
        assert!(!all.contains("```"));
        assert!(all.contains("let x = 1;"));
    }

    #[test]
    fn test_missing_image_shows_failure_above_body() {
        let message = Message::new(
            Role::User,
            "what is this?",
            vec!["/no/such/image.png".to_string()],
        );
        let bubble = render(&message, 100);
        let rows: Vec<String> = bubble.lines.iter().map(text).collect();
        let fail = rows.iter().position(|r| r.contains(IMAGE_LOAD_FAILED)).unwrap();
        let body = rows.iter().position(|r| r.contains("what is this?")).unwrap();
        assert!(fail < body);
        // Top padding row sits between the border and the image.
        assert_eq!(fail, 2);
    }
}
