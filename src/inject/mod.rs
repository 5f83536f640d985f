//! Transcript delivery via the system clipboard.
//!
//! # Overview
//!
//! The pipeline hands a finished transcript to a [`TextInjector`]; the
//! production implementation ([`ClipboardInjector`]) delivers it one of two
//! ways, selected by configuration:
//!
//! * **Auto-paste** (default):
//!   1. Save the user's current clipboard text.
//!   2. Put the transcript on the clipboard.
//!   3. Wait a short flush delay, then simulate Ctrl+V / Cmd+V.
//!   4. Wait for the target app to finish pasting, then restore the saved
//!      clipboard content (best-effort).
//! * **Copy-only**: put the transcript on the clipboard and stop.  Nothing
//!   is saved or restored; leaving the text there is the whole point.
//!
//! A failed paste simulation is not fatal: the transcript stays on the
//! clipboard and the result degrades to [`Delivery::Copied`], so the user
//! can still paste by hand.

mod clipboard;
mod keyboard;

use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::config::InjectConfig;

// test-only re-export so pipeline tests can import MockInjector without
// spelling out the submodule path.
#[cfg(test)]
pub use mock::MockInjector;

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// Errors that can surface while delivering a transcript.
#[derive(Debug, Clone, Error)]
pub enum InjectError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),
}

// ---------------------------------------------------------------------------
// Delivery / TextInjector trait
// ---------------------------------------------------------------------------

/// How a transcript actually reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pasted into the focused window.
    Pasted,
    /// Left on the clipboard for the user to paste manually.
    Copied,
}

/// Object-safe, thread-safe transcript delivery seam.
///
/// Called from a blocking task; implementations may sleep.
pub trait TextInjector: Send + Sync {
    /// Deliver `text` and report how it got there.
    fn inject(&self, text: &str) -> Result<Delivery, InjectError>;
}

// Compile-time assertion: Box<dyn TextInjector> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TextInjector>) {}
};

// ---------------------------------------------------------------------------
// ClipboardInjector
// ---------------------------------------------------------------------------

/// Production injector: clipboard write plus optional paste simulation.
#[derive(Debug, Clone)]
pub struct ClipboardInjector {
    auto_paste: bool,
    paste_delay: Duration,
    restore_delay: Duration,
}

impl ClipboardInjector {
    pub fn new(config: &InjectConfig) -> Self {
        Self {
            auto_paste: config.auto_paste,
            paste_delay: Duration::from_millis(config.paste_delay_ms),
            restore_delay: Duration::from_millis(config.restore_delay_ms),
        }
    }
}

impl TextInjector for ClipboardInjector {
    fn inject(&self, text: &str) -> Result<Delivery, InjectError> {
        if !self.auto_paste {
            clipboard::set_clipboard(text)?;
            debug!("transcript left on clipboard ({} chars)", text.chars().count());
            return Ok(Delivery::Copied);
        }

        let saved = clipboard::save_clipboard()?;
        clipboard::set_clipboard(text)?;

        // Let the clipboard manager flush before the target app reads it.
        thread::sleep(self.paste_delay);

        if let Err(e) = keyboard::simulate_paste() {
            // Keep the transcript on the clipboard instead of restoring, so
            // the user can paste it by hand.
            warn!("paste simulation failed, transcript stays on clipboard: {e}");
            return Ok(Delivery::Copied);
        }

        // Give the target app time to complete the paste before the original
        // clipboard content returns.
        thread::sleep(self.restore_delay);
        if let Err(e) = clipboard::restore_clipboard(saved) {
            debug!("clipboard restore failed: {e}");
        }

        Ok(Delivery::Pasted)
    }
}

// ---------------------------------------------------------------------------
// MockInjector  (test-only)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_delays_come_from_config() {
        let injector = ClipboardInjector::new(&InjectConfig {
            auto_paste: true,
            paste_delay_ms: 10,
            restore_delay_ms: 20,
        });
        assert!(injector.auto_paste);
        assert_eq!(injector.paste_delay, Duration::from_millis(10));
        assert_eq!(injector.restore_delay, Duration::from_millis(20));
    }

    #[test]
    fn mock_records_texts_in_order() {
        let mock = MockInjector::pasting();
        let texts = mock.texts();

        assert_eq!(mock.inject("first").unwrap(), Delivery::Pasted);
        assert_eq!(mock.inject("second").unwrap(), Delivery::Pasted);
        assert_eq!(*texts.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn mock_copying_reports_copied() {
        let mock = MockInjector::copying();
        assert_eq!(mock.inject("x").unwrap(), Delivery::Copied);
    }

    #[test]
    fn mock_failure_still_records_the_attempt() {
        let mock = MockInjector::failing("no display");
        let texts = mock.texts();

        let err = mock.inject("lost words").unwrap_err();
        assert!(matches!(err, InjectError::ClipboardAccess(_)));
        assert!(err.to_string().contains("no display"));
        assert_eq!(*texts.lock().unwrap(), ["lost words"]);
    }

    #[test]
    fn box_dyn_injector_compiles() {
        let injector: Box<dyn TextInjector> = Box::new(MockInjector::pasting());
        let _ = injector.inject("ok");
    }
}
