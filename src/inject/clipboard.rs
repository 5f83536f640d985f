//! Clipboard save / set / restore backed by the `arboard` crate.
//!
//! Every call opens a fresh [`arboard::Clipboard`] handle.  The handle is
//! cheap to create and is not `Send` on all platforms, so sharing one across
//! the pipeline's blocking tasks would buy nothing.

use arboard::Clipboard;

use super::InjectError;

/// Capture the current clipboard plain-text content.
///
/// `Ok(None)` means the clipboard was empty or held non-text data (an image,
/// a file list); that is not an error and [`restore_clipboard`] treats it as
/// "leave the clipboard alone afterwards".
///
/// # Errors
///
/// [`InjectError::ClipboardAccess`] when the OS clipboard cannot be opened.
pub(super) fn save_clipboard() -> Result<Option<String>, InjectError> {
    let mut clipboard = open_clipboard()?;
    // get_text errs on empty and on non-text content alike
    Ok(clipboard.get_text().ok())
}

/// Replace the clipboard content with `text`.
///
/// # Errors
///
/// [`InjectError::ClipboardAccess`] when the clipboard cannot be opened,
/// [`InjectError::ClipboardSet`] when the write fails.
pub(super) fn set_clipboard(text: &str) -> Result<(), InjectError> {
    let mut clipboard = open_clipboard()?;
    clipboard
        .set_text(text)
        .map_err(|e| InjectError::ClipboardSet(e.to_string()))
}

/// Put a previously saved value back.
///
/// `None` (nothing was saved) returns `Ok(())` without touching the
/// clipboard, so a user who had an image on the clipboard does not get it
/// silently replaced by an empty string.
pub(super) fn restore_clipboard(saved: Option<String>) -> Result<(), InjectError> {
    match saved {
        Some(text) => set_clipboard(&text),
        None => Ok(()),
    }
}

fn open_clipboard() -> Result<Clipboard, InjectError> {
    Clipboard::new().map_err(|e| InjectError::ClipboardAccess(e.to_string()))
}
