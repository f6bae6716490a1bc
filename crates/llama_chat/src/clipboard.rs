use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing::debug;

/// Destination for copy actions.
pub trait ClipboardSink: Send {
    fn set_text(&self, text: &str) -> Result<()>;
}

/// System clipboard. The handle is opened on first use so that headless
/// environments only fail when a copy is actually attempted.
#[derive(Default)]
pub struct ArboardClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl ArboardClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for ArboardClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut guard = self
            .handle
            .lock()
            .map_err(|_| anyhow!("clipboard lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(arboard::Clipboard::new()?);
        }
        let Some(clipboard) = guard.as_mut() else {
            return Err(anyhow!("clipboard unavailable"));
        };
        clipboard.set_text(text.to_string())?;
        debug!("Copied {} bytes to clipboard", text.len());
        Ok(())
    }
}

/// In-memory clipboard for tests and environments without a display.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Vec<String>>,
    fail: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard on which every write fails.
    pub fn failing() -> Self {
        Self {
            contents: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn last(&self) -> Option<String> {
        self.contents.lock().ok()?.last().cloned()
    }

    pub fn writes(&self) -> usize {
        self.contents.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("clipboard not available"));
        }
        self.contents
            .lock()
            .map_err(|_| anyhow!("clipboard lock poisoned"))?
            .push(text.to_string());
        Ok(())
    }
}

impl<T: ClipboardSink + Sync> ClipboardSink for std::sync::Arc<T> {
    fn set_text(&self, text: &str) -> Result<()> {
        (**self).set_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard() {
        let clipboard = MemoryClipboard::new();
        clipboard.set_text("one").unwrap();
        clipboard.set_text("two").unwrap();
        assert_eq!(clipboard.last().as_deref(), Some("two"));
        assert_eq!(clipboard.writes(), 2);

        assert!(MemoryClipboard::failing().set_text("x").is_err());
    }
}
