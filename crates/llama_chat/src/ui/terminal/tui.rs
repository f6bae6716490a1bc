// Terminal setup and teardown.
//
// The chat runs full screen on the alternate screen with mouse capture and
// bracketed paste. A panic hook restores the terminal before the default hook
// prints, except for panics caught inside the markdown renderer.

use std::io;
use std::io::stdout;
use std::io::Stdout;
use std::panic;

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;

use super::markdown;

pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Enter raw mode on the alternate screen.
pub fn init() -> io::Result<Terminal> {
    enable_raw_mode()?;
    execute!(
        stdout(),
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    set_panic_hook();

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = ratatui::Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

/// Restore terminal state. Safe to call more than once.
pub fn restore() -> io::Result<()> {
    execute!(
        stdout(),
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    disable_raw_mode()?;
    Ok(())
}

fn set_panic_hook() {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // The markdown renderer catches its own panics and falls back to
        // plain text; the terminal must stay as it is.
        if markdown::in_guarded_render() {
            return;
        }
        let _ = restore();
        hook(panic_info);
    }));
}
