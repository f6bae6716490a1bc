use tracing::{debug, trace};

use super::bubble::{render_bubble, Bubble, BubbleContext};
use super::image_art::ImageArtCache;
use crate::config::ImageStyle;
use crate::types::{Message, Role};

/// Rendered bubble for one non-system message.
#[derive(Debug, Clone)]
pub struct CachedBubble {
    /// Changes on every re-render; lets hit regions be matched to a frame.
    pub tag: u64,
    pub message_index: usize,
    pub bubble: Bubble,
    /// Assistant bubbles get a relative timestamp row below them.
    pub annotated: bool,
}

impl CachedBubble {
    /// Rows this entry occupies in the transcript.
    pub fn height(&self) -> usize {
        self.bubble.height() + usize::from(self.annotated)
    }
}

/// Size information the bubbles are laid out against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLayout {
    pub available_width: u16,
    pub viewport_height: u16,
}

/// Ordered conversation plus a bubble cache aligned with its non-system
/// messages.
pub struct MessageHistory {
    messages: Vec<Message>,
    cache: Vec<CachedBubble>,
    highlighted: usize,
    streaming_open: bool,
    next_tag: u64,
    model_name: String,
    layout: HistoryLayout,
    images: ImageArtCache,
}

impl MessageHistory {
    pub fn new(
        messages: Vec<Message>,
        model_name: impl Into<String>,
        layout: HistoryLayout,
        image_style: ImageStyle,
    ) -> Self {
        let highlighted = messages.len().saturating_sub(1);
        let mut history = Self {
            messages,
            cache: Vec::new(),
            highlighted,
            streaming_open: false,
            next_tag: 0,
            model_name: model_name.into(),
            layout,
            images: ImageArtCache::new(image_style),
        };
        history.rerender_all();
        history
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cache(&self) -> &[CachedBubble] {
        &self.cache
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn highlighted_message(&self) -> Option<&Message> {
        self.messages.get(self.highlighted)
    }

    /// Text of the newest assistant reply that has any content.
    pub fn last_response(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.text.is_empty())
            .map(|m| m.text.as_str())
    }

    /// Append a message, highlight it and render its bubble.
    pub fn append(&mut self, message: Message) -> usize {
        let index = self.messages.len();
        let previous = self.highlighted;
        self.messages.push(message);
        self.highlighted = index;
        if previous != index {
            self.rerender_message(previous);
        }
        if self.messages[index].role != Role::System {
            let entry = self.render_entry(index);
            self.cache.push(entry);
        }
        trace!("Appended message {index}");
        index
    }

    /// Append the empty assistant message that streamed text accumulates in.
    pub fn begin_response(&mut self) -> usize {
        let index = self.append(Message::new(Role::Assistant, "", Vec::new()));
        self.streaming_open = true;
        index
    }

    /// Add a delta to the open response. Returns false when no response is
    /// open, in which case nothing changes.
    pub fn stream_append(&mut self, delta: &str) -> bool {
        if !self.streaming_open {
            debug!("Dropping delta with no open response");
            return false;
        }
        let Some(last) = self.messages.last_mut() else {
            return false;
        };
        last.text.push_str(delta);
        let index = self.messages.len() - 1;
        self.rerender_message(index);
        true
    }

    /// Close the open response and render it in its final form.
    pub fn close_stream(&mut self) {
        if !self.streaming_open {
            return;
        }
        self.streaming_open = false;
        if let Some(index) = self.messages.len().checked_sub(1) {
            self.rerender_message(index);
        }
    }

    /// Move the highlight by `delta`, clamped to the history bounds. Returns
    /// whether the highlight moved.
    pub fn navigate(&mut self, delta: isize) -> bool {
        if self.messages.is_empty() {
            return false;
        }
        let last = self.messages.len() - 1;
        let target = self.highlighted.saturating_add_signed(delta).min(last);
        self.highlight(target)
    }

    /// Highlight `index` directly, e.g. from a mouse click.
    pub fn highlight(&mut self, index: usize) -> bool {
        if index >= self.messages.len() {
            return false;
        }
        let previous = self.highlighted;
        if previous == index {
            return false;
        }
        self.highlighted = index;
        self.rerender_message(previous);
        self.rerender_message(index);
        true
    }

    pub fn set_layout(&mut self, layout: HistoryLayout) {
        if layout != self.layout {
            self.layout = layout;
            self.images.clear();
            self.rerender_all();
        }
    }

    /// Re-render every bubble.
    pub fn rerender_all(&mut self) {
        let indices: Vec<usize> = (0..self.messages.len())
            .filter(|&i| self.messages[i].role != Role::System)
            .collect();
        let cache = indices.into_iter().map(|i| self.render_entry(i)).collect();
        self.cache = cache;
        debug!(
            "Rendered {} bubbles at width {}",
            self.cache.len(),
            self.layout.available_width
        );
    }

    /// Rows above the bubble for `message_index`.
    pub fn offset_of(&self, message_index: usize) -> usize {
        self.cache
            .iter()
            .take_while(|entry| entry.message_index < message_index)
            .map(CachedBubble::height)
            .sum()
    }

    pub fn total_height(&self) -> usize {
        self.cache.iter().map(CachedBubble::height).sum()
    }

    fn cache_position(&self, message_index: usize) -> Option<usize> {
        self.cache
            .binary_search_by_key(&message_index, |entry| entry.message_index)
            .ok()
    }

    fn rerender_message(&mut self, message_index: usize) {
        if let Some(pos) = self.cache_position(message_index) {
            self.cache[pos] = self.render_entry(message_index);
        }
    }

    fn render_entry(&mut self, message_index: usize) -> CachedBubble {
        let message = &self.messages[message_index];
        let selected = message_index == self.highlighted;
        let streaming = self.streaming_open && message_index + 1 == self.messages.len();
        let ctx = BubbleContext {
            available_width: self.layout.available_width,
            viewport_height: self.layout.viewport_height,
            model_name: &self.model_name,
        };
        let bubble = render_bubble(message, selected, streaming, &ctx, &mut self.images);
        let tag = self.next_tag;
        self.next_tag += 1;
        CachedBubble {
            tag,
            message_index,
            bubble,
            annotated: message.role == Role::Assistant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::terminal::theme;
    use ratatui::style::Color;

    const LAYOUT: HistoryLayout = HistoryLayout {
        available_width: 100,
        viewport_height: 30,
    };

    fn history_with(messages: Vec<Message>) -> MessageHistory {
        MessageHistory::new(messages, "llama3", LAYOUT, ImageStyle::Blocks)
    }

    fn non_system(history: &MessageHistory) -> usize {
        history
            .messages()
            .iter()
            .filter(|m| m.role != Role::System)
            .count()
    }

    #[test]
    fn test_cache_skips_system_messages() {
        let history = history_with(vec![
            Message::new(Role::System, "be nice", vec![]),
            Message::new(Role::User, "hi", vec![]),
            Message::new(Role::Assistant, "hello", vec![]),
        ]);
        assert_eq!(history.cache().len(), 2);
        assert_eq!(history.cache()[0].message_index, 1);
        assert_eq!(history.highlighted(), 2);
    }

    #[test]
    fn test_stream_append_concatenates_in_order() {
        let mut history = history_with(vec![]);
        history.append(Message::new(Role::User, "Hello", vec![]));
        history.begin_response();
        for delta in ["Hi", " there", "!"] {
            assert!(history.stream_append(delta));
        }
        assert_eq!(history.messages()[1].text, "Hi there!");
        assert_eq!(history.cache().len(), 2);
        assert_eq!(history.highlighted(), 1);

        history.close_stream();
        assert!(!history.stream_append("late"));
        assert_eq!(history.messages()[1].text, "Hi there!");
    }

    #[test]
    fn test_navigate_is_clamped() {
        let mut history = history_with(vec![
            Message::new(Role::User, "a", vec![]),
            Message::new(Role::Assistant, "b", vec![]),
            Message::new(Role::User, "c", vec![]),
        ]);
        history.navigate(1);
        assert_eq!(history.highlighted(), 2);

        history.navigate(-1);
        history.navigate(-1);
        assert_eq!(history.highlighted(), 0);
        assert!(!history.navigate(-1));
        assert_eq!(history.highlighted(), 0);

        history.navigate(5);
        assert_eq!(history.highlighted(), 2);
        assert!(!history.navigate(1));
    }

    #[test]
    fn test_navigate_on_empty_history() {
        let mut history = history_with(vec![]);
        assert!(!history.navigate(-1));
        assert!(!history.navigate(1));
        assert_eq!(history.highlighted(), 0);
    }

    #[test]
    fn test_selection_rerenders_only_affected_entries() {
        let mut history = history_with(vec![
            Message::new(Role::User, "a", vec![]),
            Message::new(Role::Assistant, "b", vec![]),
            Message::new(Role::User, "c", vec![]),
        ]);
        let tags: Vec<u64> = history.cache().iter().map(|e| e.tag).collect();
        history.navigate(-1);
        let after: Vec<u64> = history.cache().iter().map(|e| e.tag).collect();
        assert_eq!(tags[0], after[0]);
        assert_ne!(tags[1], after[1]);
        assert_ne!(tags[2], after[2]);
    }

    #[test]
    fn test_offsets_include_timestamp_rows() {
        let history = history_with(vec![
            Message::new(Role::User, "a", vec![]),
            Message::new(Role::Assistant, "b", vec![]),
            Message::new(Role::User, "c", vec![]),
        ]);
        assert_eq!(history.offset_of(0), 0);
        // user bubble: 3 rows
        assert_eq!(history.offset_of(1), 3);
        // assistant bubble: 3 rows + timestamp
        assert_eq!(history.offset_of(2), 7);
        assert_eq!(history.total_height(), 10);
    }

    #[test]
    fn test_resize_keeps_content_and_highlight() {
        let mut history = history_with(vec![
            Message::new(Role::User, "question ".repeat(20), vec![]),
            Message::new(Role::Assistant, "answer ".repeat(40), vec![]),
        ]);
        history.navigate(-1);
        let before: Vec<Message> = history.messages().to_vec();
        let wide_height = history.total_height();

        history.set_layout(HistoryLayout {
            available_width: 40,
            viewport_height: 20,
        });
        assert_eq!(history.messages(), before.as_slice());
        assert_eq!(history.highlighted(), 0);
        assert_eq!(history.cache().len(), non_system(&history));
        assert!(history.total_height() > wide_height);
        assert!(history
            .cache()
            .iter()
            .all(|e| e.bubble.x + e.bubble.width <= 40));
    }

    fn border_color(history: &MessageHistory, message_index: usize) -> Option<Color> {
        let entry = history
            .cache()
            .iter()
            .find(|e| e.message_index == message_index)
            .unwrap();
        entry.bubble.lines[0]
            .spans
            .iter()
            .find(|s| s.content.trim() == "╭")
            .and_then(|s| s.style.fg)
    }

    #[test]
    fn test_highlighted_bubble_is_styled_without_navigation() {
        let mut history = history_with(vec![
            Message::new(Role::User, "a", vec![]),
            Message::new(Role::Assistant, "b", vec![]),
        ]);
        assert_eq!(border_color(&history, 1), Some(theme::TEAL));
        assert_eq!(border_color(&history, 0), Some(theme::PURPLE));

        history.append(Message::new(Role::User, "c", vec![]));
        assert_eq!(history.highlighted(), 2);
        assert_eq!(border_color(&history, 2), Some(theme::TEAL));
        assert_eq!(border_color(&history, 1), Some(theme::LAVENDER));

        history.navigate(-1);
        assert_eq!(border_color(&history, 1), Some(theme::TEAL));
        assert_eq!(border_color(&history, 2), Some(theme::PURPLE));
    }

    #[test]
    fn test_resize_drops_image_art_of_old_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 200, 30, 255]))
            .save(&path)
            .unwrap();
        let mut history = history_with(vec![Message::new(
            Role::User,
            "look",
            vec![path.to_string_lossy().into_owned()],
        )]);
        assert_eq!(history.images.len(), 1);

        for width in [60, 40, 90] {
            history.set_layout(HistoryLayout {
                available_width: width,
                viewport_height: 20,
            });
            assert_eq!(history.images.len(), 1);
        }
    }

    #[test]
    fn test_last_response_skips_empty_placeholder() {
        let mut history = history_with(vec![
            Message::new(Role::User, "a", vec![]),
            Message::new(Role::Assistant, "first", vec![]),
        ]);
        history.append(Message::new(Role::User, "b", vec![]));
        history.begin_response();
        assert_eq!(history.last_response(), Some("first"));
    }
}
