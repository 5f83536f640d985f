//! Whisperkey: push-to-talk dictation for the desktop.
//!
//! Hold a key and speak; on release the transcript lands in the focused
//! window. The crate is a small set of layers around one [`pipeline`] loop:
//!
//! * [`audio`]: microphone capture on a dedicated worker thread, producing
//!   WAV artifacts on disk.
//! * [`dsp`]: conditioning applied to each artifact before recognition
//!   (silence trimming, noise gate, gain normalization).
//! * [`stt`]: the [`Transcriber`](stt::Transcriber) seam plus the external
//!   recognizer command.
//! * [`inject`]: text delivery, synthetic paste with a clipboard fallback.
//! * [`pipeline`]: the coordinator tying the layers together, and the event
//!   types a frontend consumes.
//! * [`workflow`]: the dictation state machine, shared with frontends.
//! * [`config`]: TOML settings and platform paths.
//! * [`history`]: in-memory log of finished transcripts.
//!
//! Frontends (hotkey daemon, tray app, the bundled line-driven CLI) send
//! [`PipelineCommand`](pipeline::PipelineCommand)s and render
//! [`PipelineEvent`](pipeline::PipelineEvent)s; everything between the
//! gesture and the delivered text lives here.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod history;
pub mod inject;
pub mod pipeline;
pub mod stt;
pub mod workflow;
