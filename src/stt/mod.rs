//! Speech recognition seam.
//!
//! [`Transcriber`] is the interface the pipeline calls with a conditioned
//! WAV artifact; it is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn Transcriber>` and invoked from a blocking task.  The
//! call may take arbitrarily long; the pipeline bounds it with a watchdog
//! rather than cooperative cancellation, so implementations are free to
//! block.
//!
//! [`CommandTranscriber`] is the production implementation: it shells out
//! to an external recognizer binary and captures stdout.
//!
//! ```rust,no_run
//! use whisperkey::config::SttConfig;
//! use whisperkey::stt::{CommandTranscriber, Transcriber};
//!
//! let engine = CommandTranscriber::new(SttConfig::default());
//! let text = engine.transcribe(std::path::Path::new("recording.wav")).unwrap();
//! println!("{text}");
//! ```

use std::path::Path;

use thiserror::Error;

pub mod command;

pub use command::CommandTranscriber;

// test-only re-export so pipeline tests can import MockTranscriber without
// spelling out the submodule path.
#[cfg(test)]
pub use mock::MockTranscriber;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Errors from a recognition attempt.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The recognizer process could not be started at all.
    #[error("failed to launch recognizer {program:?}: {message}")]
    Launch { program: String, message: String },

    /// The recognizer ran and exited unsuccessfully.
    #[error("recognizer failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    /// Generic recognition failure.
    #[error("transcription error: {0}")]
    Transcription(String),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a speech recognizer.
///
/// # Contract
///
/// - `artifact` is a mono PCM WAV file on local disk.
/// - The call blocks until recognition finishes or fails; there are no
///   partial results.
/// - An empty `Ok` string is a valid outcome (the recording contained no
///   recognizable speech); callers decide what to do with it.
pub trait Transcriber: Send + Sync {
    /// Recognize the audio in `artifact` and return the transcript.
    fn transcribe(&self, artifact: &Path) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
