use std::path::{Path, PathBuf};

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, warn};

use super::theme;
use crate::utils::display_path;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const HELP: &str = "←/→: Navigate • Enter: Select File • ctrl+o: Return to chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Pending,
    Selected(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    /// Files without an image extension are listed but cannot be picked.
    pub selectable: bool,
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Directory browser restricted to image files. It keeps its location
/// between openings.
#[derive(Debug, Clone)]
pub struct ImagePicker {
    dir: PathBuf,
    entries: Vec<PickerEntry>,
    selected: usize,
    error: Option<String>,
}

impl ImagePicker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut picker = Self {
            dir: dir.into(),
            entries: Vec::new(),
            selected: 0,
            error: None,
        };
        picker.refresh();
        picker
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[PickerEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&PickerEntry> {
        self.entries.get(self.selected)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Re-read the current directory. Hidden entries are skipped and
    /// directories come first.
    pub fn refresh(&mut self) {
        self.error = None;
        let read = match std::fs::read_dir(&self.dir) {
            Ok(read) => read,
            Err(e) => {
                warn!("Cannot read directory {}: {e}", self.dir.display());
                self.error = Some(format!("Cannot read {}: {e}", display_path(&self.dir)));
                self.entries.clear();
                self.selected = 0;
                return;
            }
        };
        let mut entries: Vec<PickerEntry> = read
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    return None;
                }
                let path = entry.path();
                let is_dir = path.is_dir();
                Some(PickerEntry {
                    selectable: is_dir || is_image_path(&path),
                    name,
                    path,
                    is_dir,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        self.entries = entries;
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerOutcome {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.entries.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => return self.open_selected(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => self.go_up(),
            _ => {}
        }
        PickerOutcome::Pending
    }

    fn open_selected(&mut self) -> PickerOutcome {
        let Some(entry) = self.entries.get(self.selected).cloned() else {
            return PickerOutcome::Pending;
        };
        if entry.is_dir {
            debug!("Picker entering {}", entry.path.display());
            self.dir = entry.path;
            self.selected = 0;
            self.refresh();
            return PickerOutcome::Pending;
        }
        if !entry.selectable {
            self.error = Some(format!(
                "{} is not a valid image. Please select a file with a .png or .jpg extension.",
                entry.name
            ));
            return PickerOutcome::Pending;
        }
        PickerOutcome::Selected(entry.path)
    }

    fn go_up(&mut self) {
        let Some(parent) = self.dir.parent().map(Path::to_path_buf) else {
            return;
        };
        let previous = std::mem::replace(&mut self.dir, parent);
        self.selected = 0;
        self.refresh();
        if let Some(pos) = self.entries.iter().position(|e| e.path == previous) {
            self.selected = pos;
        }
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.height < 4 {
            return;
        }
        let header = match &self.error {
            Some(error) => Span::styled(format!("  {error}"), Style::default().fg(theme::GRAY)),
            None => Span::styled("  Pick a file:", Style::default().fg(theme::CREAM)),
        };
        Line::from(header).render(Rect::new(area.x, area.y + 1, area.width, 1), buf);

        let list_top = area.y + 3;
        let list_height = area.height.saturating_sub(5) as usize;
        let first = (self.selected + 1).saturating_sub(list_height);
        for (row, (index, entry)) in self
            .entries
            .iter()
            .enumerate()
            .skip(first)
            .take(list_height)
            .enumerate()
        {
            let is_cursor = index == self.selected;
            let cursor = if is_cursor { "> " } else { "  " };
            let style = if entry.is_dir {
                Style::default().fg(theme::PURPLE).add_modifier(Modifier::BOLD)
            } else if entry.selectable {
                Style::default().fg(theme::CREAM)
            } else {
                Style::default().fg(theme::GRAY).add_modifier(Modifier::DIM)
            };
            let style = if is_cursor {
                style.fg(theme::TEAL)
            } else {
                style
            };
            let name = if entry.is_dir {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            };
            Line::from(vec![
                Span::raw("  "),
                Span::styled(cursor, Style::default().fg(theme::TEAL)),
                Span::styled(name, style),
            ])
            .render(Rect::new(area.x, list_top + row as u16, area.width, 1), buf);
        }

        Line::from(Span::styled(format!(" {HELP}"), theme::hint_text_style()))
            .render(Rect::new(area.x, area.bottom() - 1, area.width, 1), buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("photos")).unwrap();
        std::fs::write(dir.path().join("photos/cat.PNG"), b"").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::write(dir.path().join(".hidden.png"), b"").unwrap();
        dir
    }

    #[test]
    fn test_listing_order_and_filters() {
        let dir = fixture();
        let picker = ImagePicker::new(dir.path());
        let names: Vec<_> = picker.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["photos", "a.txt", "b.jpg"]);
        let selectable: Vec<_> = picker.entries().iter().map(|e| e.selectable).collect();
        assert_eq!(selectable, vec![true, false, true]);
    }

    #[test]
    fn test_navigate_into_directory_and_select() {
        let dir = fixture();
        let mut picker = ImagePicker::new(dir.path());
        assert_eq!(picker.handle_key(key(KeyCode::Enter)), PickerOutcome::Pending);
        assert_eq!(picker.dir(), dir.path().join("photos"));

        let outcome = picker.handle_key(key(KeyCode::Char('l')));
        assert_eq!(
            outcome,
            PickerOutcome::Selected(dir.path().join("photos/cat.PNG"))
        );

        picker.handle_key(key(KeyCode::Left));
        assert_eq!(picker.dir(), dir.path());
        assert_eq!(picker.selected().unwrap().name, "photos");
    }

    #[test]
    fn test_disabled_file_sets_error() {
        let dir = fixture();
        let mut picker = ImagePicker::new(dir.path());
        picker.handle_key(key(KeyCode::Down));
        assert_eq!(picker.handle_key(key(KeyCode::Enter)), PickerOutcome::Pending);
        assert!(picker.error().unwrap().contains("a.txt is not a valid image"));

        picker.handle_key(key(KeyCode::Char('j')));
        picker.handle_key(key(KeyCode::Char('j')));
        assert_eq!(picker.selected().unwrap().name, "b.jpg");
    }

    #[test]
    fn test_unreadable_directory() {
        let picker = ImagePicker::new("/definitely/not/a/dir");
        assert!(picker.entries().is_empty());
        assert!(picker.error().is_some());
    }

    #[test]
    fn test_render_marks_cursor() {
        let dir = fixture();
        let picker = ImagePicker::new(dir.path());
        let area = Rect::new(0, 0, 70, 12);
        let mut buf = Buffer::empty(area);
        picker.render(area, &mut buf);
        let row = |y: u16| -> String { (0..70).map(|x| buf[(x, y)].symbol().to_string()).collect() };
        assert!(row(1).contains("Pick a file:"));
        assert!(row(3).contains("> photos/"));
        assert!(row(11).contains("ctrl+o: Return to chat"));
    }
}
