//! Pipeline coordination for Whisperkey.
//!
//! This module wires the full capture → conditioning → recognition →
//! injection pipeline behind a small command/event surface: callers send
//! [`PipelineCommand`]s and receive [`PipelineEvent`]s, and everything in
//! between is serialized by the [`Coordinator`] task.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc)                      CaptureEvent (mpsc)
//!        │                                           │
//!        ▼                                           ▼
//! Coordinator::run()  ← async tokio task, single owner of the cycle
//!        │
//!        ├─ Start  → SessionManager::start()
//!        ├─ Stop   → SessionManager::stop() … ArtifactReady
//!        │            └─ spawn_blocking(condition + transcribe), watchdog
//!        ├─ Cancel → SessionManager::cancel(), drop in-flight work
//!        │
//!        └─ TextInjector::inject() → HistorySink::record()
//!                                  → PipelineEvent::TranscriptionCompleted
//!
//! StateMachine (Arc) ←── readable by any frontend at any time
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use whisperkey::audio::SessionManager;
//! use whisperkey::config::AppConfig;
//! use whisperkey::dsp::Conditioner;
//! use whisperkey::history::MemoryHistory;
//! use whisperkey::pipeline::{Coordinator, PipelineCommand};
//! use whisperkey::workflow::StateMachine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let (session, capture_events) =
//!         SessionManager::spawn(&config.audio, "/tmp/scratch".as_ref())?;
//!
//!     // (transcriber and injector constructed from config)
//!     # use whisperkey::stt::Transcriber;
//!     # use whisperkey::inject::TextInjector;
//!     # fn make_transcriber() -> Arc<dyn Transcriber> { unimplemented!() }
//!     # fn make_injector() -> Arc<dyn TextInjector> { unimplemented!() }
//!
//!     let (coordinator, mut events) = Coordinator::new(
//!         session,
//!         Conditioner::new(config.dsp.clone()),
//!         make_transcriber(),
//!         make_injector(),
//!         Arc::new(MemoryHistory::default()),
//!         Arc::new(StateMachine::new()),
//!         Duration::from_secs(config.pipeline.watchdog_secs),
//!         config.audio.sample_rate,
//!         config.stt.model.clone(),
//!     );
//!
//!     let (commands, command_rx) = mpsc::channel(16);
//!     tokio::spawn(coordinator.run(command_rx, capture_events));
//!
//!     // commands is driven by the hotkey / frontend layer
//!     commands.send(PipelineCommand::Start).await?;
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     # Ok(())
//! }
//! ```

pub mod coordinator;
pub mod events;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::Coordinator;
pub use events::{PipelineCommand, PipelineEvent, RecordingStatus, TranscriptionOutcome};
