use derive_more::IsVariant;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press means to the chat screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum KeyAction {
    Quit,
    ToggleHelp,
    ToggleImagePicker,
    RemoveAttachment,
    PreviousMessage,
    NextMessage,
    HalfPageUp,
    HalfPageDown,
    LineUp,
    LineDown,
    CopyHighlighted,
    CopyLastResponse,
    Submit,
    Newline,
    /// Anything else; forwarded to the focused input.
    Input(KeyEvent),
}

impl KeyAction {
    /// Actions that stay available while a response is streaming.
    pub fn allowed_while_streaming(&self) -> bool {
        matches!(
            self,
            KeyAction::PreviousMessage
                | KeyAction::NextMessage
                | KeyAction::HalfPageUp
                | KeyAction::HalfPageDown
                | KeyAction::LineUp
                | KeyAction::LineDown
                | KeyAction::CopyHighlighted
                | KeyAction::CopyLastResponse
        )
    }
}

pub fn classify(key: KeyEvent) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('c') if ctrl => KeyAction::Quit,
        KeyCode::Char('h') if ctrl => KeyAction::ToggleHelp,
        KeyCode::Char('o') if ctrl => KeyAction::ToggleImagePicker,
        KeyCode::Char('x') if ctrl => KeyAction::RemoveAttachment,
        KeyCode::Char('p') if ctrl => KeyAction::PreviousMessage,
        KeyCode::Char('n') if ctrl => KeyAction::NextMessage,
        KeyCode::Char('u') if ctrl => KeyAction::HalfPageUp,
        KeyCode::Char('d') if ctrl => KeyAction::HalfPageDown,
        KeyCode::Up if ctrl => KeyAction::LineUp,
        KeyCode::Down if ctrl => KeyAction::LineDown,
        KeyCode::Char('y') if alt => KeyAction::CopyHighlighted,
        KeyCode::Char('y') if ctrl => KeyAction::CopyLastResponse,
        KeyCode::Enter if alt => KeyAction::Newline,
        KeyCode::Enter if key.modifiers.is_empty() => KeyAction::Submit,
        _ => KeyAction::Input(key),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub keys: &'static str,
    pub description: &'static str,
}

const fn binding(keys: &'static str, description: &'static str) -> KeyBinding {
    KeyBinding { keys, description }
}

/// Bindings listed in the help overlay, as (navigation, actions) columns.
pub fn help_columns(multimodal: bool) -> (Vec<KeyBinding>, Vec<KeyBinding>) {
    let navigation = vec![
        binding("ctrl+p", "previous message"),
        binding("ctrl+n", "next message"),
        binding("ctrl+u", "half page up"),
        binding("ctrl+d", "half page down"),
        binding("ctrl+↑", "scroll up"),
        binding("ctrl+↓", "scroll down"),
    ];
    let mut actions = vec![
        binding("alt+y", "copy highlighted message"),
        binding("ctrl+y", "copy last response"),
    ];
    if multimodal {
        actions.push(binding("ctrl+o", "toggle image picker"));
        actions.push(binding("ctrl+x", "remove attachment"));
    }
    actions.extend([
        binding("ctrl+h", "toggle help"),
        binding("ctrl+c/esc", "quit"),
    ]);
    (navigation, actions)
}

/// Short hints shown under the prompt.
pub fn footer_hints(multimodal: bool) -> Vec<KeyBinding> {
    let mut hints = vec![
        binding("enter", "submit"),
        binding("alt+enter", "new line"),
    ];
    if multimodal {
        hints.push(binding("ctrl+o", "open image picker"));
    }
    hints.push(binding("ctrl+h", "help"));
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyEventKind, KeyEventState};

    fn create_key_event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_bindings() {
        let cases = [
            (KeyCode::Esc, KeyModifiers::NONE, KeyAction::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL, KeyAction::Quit),
            (KeyCode::Char('h'), KeyModifiers::CONTROL, KeyAction::ToggleHelp),
            (KeyCode::Char('o'), KeyModifiers::CONTROL, KeyAction::ToggleImagePicker),
            (KeyCode::Char('x'), KeyModifiers::CONTROL, KeyAction::RemoveAttachment),
            (KeyCode::Char('p'), KeyModifiers::CONTROL, KeyAction::PreviousMessage),
            (KeyCode::Char('n'), KeyModifiers::CONTROL, KeyAction::NextMessage),
            (KeyCode::Char('u'), KeyModifiers::CONTROL, KeyAction::HalfPageUp),
            (KeyCode::Char('d'), KeyModifiers::CONTROL, KeyAction::HalfPageDown),
            (KeyCode::Up, KeyModifiers::CONTROL, KeyAction::LineUp),
            (KeyCode::Down, KeyModifiers::CONTROL, KeyAction::LineDown),
            (KeyCode::Char('y'), KeyModifiers::ALT, KeyAction::CopyHighlighted),
            (KeyCode::Char('y'), KeyModifiers::CONTROL, KeyAction::CopyLastResponse),
            (KeyCode::Enter, KeyModifiers::ALT, KeyAction::Newline),
            (KeyCode::Enter, KeyModifiers::NONE, KeyAction::Submit),
        ];
        for (code, modifiers, expected) in cases {
            assert_eq!(classify(create_key_event(code, modifiers)), expected, "{code:?}");
        }
    }

    #[test]
    fn test_plain_keys_are_input() {
        let event = create_key_event(KeyCode::Char('h'), KeyModifiers::NONE);
        assert_eq!(classify(event), KeyAction::Input(event));
        let up = create_key_event(KeyCode::Up, KeyModifiers::NONE);
        assert!(classify(up).is_input());
    }

    #[test]
    fn test_streaming_filter() {
        assert!(KeyAction::PreviousMessage.allowed_while_streaming());
        assert!(KeyAction::CopyLastResponse.allowed_while_streaming());
        assert!(!KeyAction::Submit.allowed_while_streaming());
        assert!(!KeyAction::ToggleImagePicker.allowed_while_streaming());
        assert!(!KeyAction::Input(create_key_event(KeyCode::Char('a'), KeyModifiers::NONE))
            .allowed_while_streaming());
    }

    #[test]
    fn test_picker_bindings_only_for_multimodal() {
        let (_, actions) = help_columns(false);
        assert!(actions.iter().all(|b| b.keys != "ctrl+o"));
        let (_, actions) = help_columns(true);
        assert!(actions.iter().any(|b| b.keys == "ctrl+o"));
        assert!(footer_hints(true).iter().any(|b| b.keys == "ctrl+o"));
    }
}
