//! Scoped save/restore of the OS clipboard.
//!
//! The clipboard is the data channel for prompt delivery, so any operation
//! that writes to it runs inside a guard that puts the user's clipboard
//! back afterwards. Clipboard handling is strictly best-effort: the guarded
//! operation's own outcome is always what the caller observes.

use std::future::Future;

use anyhow::Result;
use tracing::warn;

/// Text clipboard access. Implemented by the OS clipboard and by in-memory
/// doubles in tests.
pub trait Clipboard: Send + Sync {
    fn read_text(&self) -> Result<String>;
    fn write_text(&self, text: &str) -> Result<()>;
}

/// System clipboard through arboard. A fresh handle per call: arboard
/// contexts are cheap and not `Sync`.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String> {
        Ok(arboard::Clipboard::new()?.get_text()?)
    }

    fn write_text(&self, text: &str) -> Result<()> {
        arboard::Clipboard::new()?.set_text(text.to_string())?;
        Ok(())
    }
}

/// Snapshot of the clipboard's text, restored on drop unless restored
/// explicitly first.
pub struct ClipboardGuard<'a> {
    clipboard: &'a dyn Clipboard,
    snapshot: Option<String>,
}

impl<'a> ClipboardGuard<'a> {
    /// Snapshot the current clipboard text. A read failure means there is
    /// nothing to restore; it never aborts the guarded operation.
    pub fn save(clipboard: &'a dyn Clipboard) -> Self {
        let snapshot = match clipboard.read_text() {
            Ok(text) => Some(text),
            Err(err) => {
                warn!("could not snapshot clipboard, nothing will be restored: {err:#}");
                None
            }
        };
        Self {
            clipboard,
            snapshot,
        }
    }

    /// Put the snapshot back. A restore failure is logged and swallowed.
    pub fn restore(mut self) {
        self.restore_inner();
    }

    fn restore_inner(&mut self) {
        if let Some(text) = self.snapshot.take() {
            if let Err(err) = self.clipboard.write_text(&text) {
                warn!("could not restore clipboard: {err:#}");
            }
        }
    }
}

impl Drop for ClipboardGuard<'_> {
    fn drop(&mut self) {
        self.restore_inner();
    }
}

/// Run `op` with the clipboard snapshotted before and restored after, on
/// every exit path including unwinds.
pub async fn with_clipboard_guard<T, F>(clipboard: &dyn Clipboard, op: F) -> T
where
    F: Future<Output = T>,
{
    let guard = ClipboardGuard::save(clipboard);
    let out = op.await;
    guard.restore();
    out
}
