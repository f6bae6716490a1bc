use chrono::{DateTime, Utc};
use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use super::history::MessageHistory;
use super::theme;
use crate::utils::relative_time;

/// Rows between the bottom of the transcript box and the bottom of the screen,
/// plus the transcript's own border.
pub const CHROME_ROWS: u16 = 4;

/// Visible window over the concatenated bubbles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    offset: usize,
    height: u16,
}

impl Viewport {
    pub fn new(height: u16) -> Self {
        Self { offset: 0, height }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn set_height(&mut self, height: u16, total: usize) {
        self.height = height;
        self.offset = self.offset.min(self.max_offset(total));
    }

    fn max_offset(&self, total: usize) -> usize {
        total.saturating_sub(self.height as usize)
    }

    pub fn scroll_to_bottom(&mut self, total: usize) {
        self.offset = self.max_offset(total);
    }

    pub fn scroll_to(&mut self, offset: usize, total: usize) {
        self.offset = offset.min(self.max_offset(total));
    }

    pub fn line_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn line_down(&mut self, lines: usize, total: usize) {
        self.scroll_to(self.offset.saturating_add(lines), total);
    }

    pub fn half_page_up(&mut self) {
        self.line_up(self.half_page());
    }

    pub fn half_page_down(&mut self, total: usize) {
        self.line_down(self.half_page(), total);
    }

    fn half_page(&self) -> usize {
        (self.height as usize / 2).max(1)
    }
}

/// Height of the transcript viewport for a terminal of `terminal_height` rows
/// with an input form of `form_height` rows.
pub fn viewport_height(terminal_height: u16, form_height: u16) -> u16 {
    terminal_height.saturating_sub(form_height + CHROME_ROWS)
}

/// Screen rectangle covered by a bubble in the last drawn frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRegion {
    pub area: Rect,
    pub message_index: usize,
    pub tag: u64,
}

/// Bubble regions of the last frame, rebuilt on every draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HitMap {
    regions: Vec<HitRegion>,
}

impl HitMap {
    pub fn push(&mut self, region: HitRegion) {
        self.regions.push(region);
    }

    pub fn regions(&self) -> &[HitRegion] {
        &self.regions
    }

    /// Message under the screen cell `(column, row)`.
    pub fn hit(&self, column: u16, row: u16) -> Option<usize> {
        let position = Position::new(column, row);
        self.regions
            .iter()
            .find(|region| region.area.contains(position))
            .map(|region| region.message_index)
    }
}

/// Lines visible through `viewport`, drawn into `area`, plus where each visible
/// bubble landed on screen.
pub fn visible_lines(
    history: &MessageHistory,
    viewport: &Viewport,
    area: Rect,
    now: DateTime<Utc>,
) -> (Vec<Line<'static>>, HitMap) {
    let start = viewport.offset();
    let end = start + area.height as usize;
    let mut lines = Vec::with_capacity(area.height as usize);
    let mut hits = HitMap::default();
    let mut y = 0usize;

    for entry in history.cache() {
        let height = entry.height();
        let entry_end = y + height;
        if entry_end <= start {
            y = entry_end;
            continue;
        }
        if y >= end {
            break;
        }

        let bubble_rows = entry.bubble.height();
        let first = start.max(y);
        let last = end.min(y + bubble_rows);
        if first < last {
            hits.push(HitRegion {
                area: Rect::new(
                    area.x + entry.bubble.x,
                    area.y + (first - start) as u16,
                    entry.bubble.width,
                    (last - first) as u16,
                ),
                message_index: entry.message_index,
                tag: entry.tag,
            });
            lines.extend(entry.bubble.lines[first - y..last - y].iter().cloned());
        }
        if entry.annotated && y + bubble_rows >= start && y + bubble_rows < end {
            let created_at = history.messages()[entry.message_index].created_at;
            lines.push(timestamp_line(created_at, now));
        }
        y = entry_end;
    }
    (lines, hits)
}

fn timestamp_line(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {}", relative_time(created_at, now)),
        Style::default()
            .fg(theme::GRAY)
            .add_modifier(Modifier::ITALIC),
    ))
}
