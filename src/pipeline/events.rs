//! Commands into and events out of the dictation pipeline.
//!
//! A frontend talks to the [`Coordinator`](super::Coordinator) exclusively
//! through these types: gesture commands go in over one channel, progress
//! and results come back over another.  Nothing here blocks; both sides are
//! plain `tokio::sync::mpsc` payloads.

use crate::history::HistoryEntry;

/// Gesture-level commands a frontend sends to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// The push-to-talk gesture went down: begin capturing.
    Start,
    /// The gesture was released: finalize the recording and transcribe it.
    Stop,
    /// Abandon the current dictation without producing any text.
    Cancel,
}

/// Coarse progress a frontend can show directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStatus {
    /// Microphone is live and capturing.
    Recording,
    /// Recording finalized; conditioning and recognition are under way.
    Processing,
    /// A transcript exists and is being delivered to the focused window.
    Pasting,
    /// The transcript was left on the clipboard instead of pasted.
    Copied,
    /// The dictation was abandoned on request.
    Cancelled,
}

/// Terminal report for one dictation cycle.
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    /// The recognized text; empty when nothing was recognized or the cycle
    /// failed.
    pub text: String,
    /// Whether recognition produced a usable result.
    pub success: bool,
    /// User-facing message when something went wrong.  Can accompany
    /// `success == true` when recognition worked but delivery failed.
    pub error: Option<String>,
    /// History record, present for successful non-empty transcriptions.
    pub entry: Option<HistoryEntry>,
    /// Whether the text reached the user (pasted or left on the clipboard).
    pub injected: bool,
}

/// Everything the coordinator reports while running.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Progress changed.
    Status(RecordingStatus),
    /// One dictation cycle finished, successfully or not.
    TranscriptionCompleted(TranscriptionOutcome),
    /// A failure outside the recognition path: no microphone, the device
    /// refusing to open, or the stream dying mid-recording.
    Error(String),
}
