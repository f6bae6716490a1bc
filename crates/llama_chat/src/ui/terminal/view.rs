use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph, Widget},
    Frame,
};

use super::composer::Composer;
use super::keys::footer_hints;
use super::overlay::{render_help, render_notification};
use super::state::ChatState;
use super::theme;
use super::viewport::{visible_lines, HitMap};
use crate::utils::display_path;

const ATTACHMENT_ICON: &str = "󰁦";

/// Draw one frame and return where the bubbles landed.
pub fn draw(frame: &mut Frame, state: &ChatState, now: DateTime<Utc>) -> HitMap {
    let area = frame.area();
    let mut hits = HitMap::default();

    if let Some(picker) = state.picker() {
        picker.render(area, frame.buffer_mut());
    } else {
        let [transcript, attachment, composer, hint] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(Composer::HEIGHT),
            Constraint::Length(1),
        ])
        .areas(area);

        hits = draw_transcript(frame, state, transcript, now);
        draw_attachment(frame, state, attachment);
        let title = format!("Chat with {}", state.settings().model_name);
        if let Some(cursor) = state.composer().render(composer, frame.buffer_mut(), &title) {
            if !state.help_visible() {
                frame.set_cursor_position(cursor);
            }
        }
        frame.render_widget(hint_line(state.settings().multimodal), hint);
    }

    if state.help_visible() {
        render_help(area, frame.buffer_mut(), state.settings().multimodal);
    }
    if let Some(text) = state.notification() {
        render_notification(text, area, frame.buffer_mut());
    }
    hits
}

fn draw_transcript(frame: &mut Frame, state: &ChatState, area: Rect, now: DateTime<Utc>) -> HitMap {
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::GRAY))
        .title(Span::styled(
            format!(" {} ", state.settings().title),
            Style::default().fg(theme::CREAM),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (lines, hits) = visible_lines(state.history(), state.viewport(), inner, now);
    Paragraph::new(lines).render(inner, frame.buffer_mut());
    hits
}

fn draw_attachment(frame: &mut Frame, state: &ChatState, area: Rect) {
    let Some(path) = state.attachment() else {
        return;
    };
    let label = format!(" {ATTACHMENT_ICON} {} ", display_path(path));
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(label, theme::tab_style(theme::TEAL))))
            .alignment(Alignment::Center),
        area,
    );
}

fn hint_line(multimodal: bool) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for (i, binding) in footer_hints(multimodal).into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", theme::hint_text_style()));
        }
        spans.push(Span::styled(binding.keys, theme::hint_key_style()));
        spans.push(Span::styled(
            format!(" {}", binding.description),
            theme::hint_text_style(),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageStyle;
    use crate::types::{Message, Role};
    use crate::ui::terminal::events::ChatEvent;
    use crate::ui::terminal::state::ChatSettings;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use std::time::Duration;

    fn state(width: u16, height: u16, multimodal: bool) -> ChatState {
        let settings = ChatSettings {
            model_name: "llama3".to_string(),
            title: "Weekend plans".to_string(),
            system_message: String::new(),
            multimodal,
            image_style: ImageStyle::Blocks,
            notify_clipboard_errors: false,
            notify_picker_cancel: false,
            notification_timeout: Duration::from_secs(3),
            picker_dir: std::env::temp_dir(),
        };
        let messages = vec![
            Message::new(Role::User, "Any ideas?", vec![]),
            Message::new(Role::Assistant, "Go hiking.", vec![]),
        ];
        ChatState::new(settings, messages, width, height)
    }

    fn render(state: &ChatState) -> (Buffer, HitMap) {
        let (width, height) = state.size();
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        let mut hits = HitMap::default();
        terminal
            .draw(|frame| hits = draw(frame, state, Utc::now()))
            .unwrap();
        (terminal.backend().buffer().clone(), hits)
    }

    fn screen(buf: &Buffer) -> Vec<String> {
        (0..buf.area.height)
            .map(|y| {
                (0..buf.area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_frame_layout() {
        let state = state(80, 24, false);
        let (buf, hits) = render(&state);
        let rows = screen(&buf);

        assert!(rows[0].contains("Weekend plans"));
        assert!(rows.iter().any(|r| r.contains("Any ideas?")));
        assert!(rows.iter().any(|r| r.contains("Go hiking.")));
        assert!(rows[17].starts_with('╰'));
        assert!(rows[18].trim().is_empty());
        assert!(rows[19].contains("Chat with llama3"));
        assert!(rows[23].contains("enter submit"));
        assert_eq!(hits.regions().len(), 2);
    }

    #[test]
    fn test_help_and_notification_overlay() {
        let mut state = state(100, 30, true);
        state.update(ChatEvent::Key(KeyEvent::new(
            KeyCode::Char('h'),
            KeyModifiers::CONTROL,
        )));
        state.update(ChatEvent::Copied(
            crate::ui::terminal::events::CopyKind::LastResponse,
        ));
        let (buf, _) = render(&state);
        let all = screen(&buf).join("\n");
        assert!(all.contains("Help Menu"));
        assert!(all.contains("Copied last response to clipboard"));
    }

    #[test]
    fn test_picker_takes_whole_screen() {
        let mut state = state(80, 20, true);
        state.update(ChatEvent::Key(KeyEvent::new(
            KeyCode::Char('o'),
            KeyModifiers::CONTROL,
        )));
        let (buf, hits) = render(&state);
        let rows = screen(&buf);
        assert!(rows[1].contains("Pick a file:"));
        assert!(rows[19].contains("ctrl+o: Return to chat"));
        assert!(hits.regions().is_empty());
    }
}
