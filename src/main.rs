//! Application entry point: the line-driven Whisperkey frontend.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the tokio runtime (multi-thread, 2 workers).
//! 4. Spawn the capture worker ([`SessionManager`]).
//! 5. Build the recognizer, injector, history log, and workflow states.
//! 6. Spawn the pipeline coordinator and the event printer on the runtime.
//! 7. Read gestures from stdin until `quit` or EOF, then wait for the
//!    coordinator to drain.
//!
//! The stdin protocol stands in for a hotkey daemon or tray frontend: each
//! line is one gesture (`start`, `stop`, `cancel`), plus `devices` to list
//! capture devices and `quit` to leave.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use whisperkey::{
    audio::{input_device_names, SessionManager},
    config::{AppConfig, AppPaths},
    dsp::Conditioner,
    history::{HistorySink, MemoryHistory},
    inject::{ClipboardInjector, TextInjector},
    pipeline::{Coordinator, PipelineCommand, PipelineEvent, RecordingStatus},
    stt::{CommandTranscriber, Transcriber},
    workflow::StateMachine,
};

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

/// Render pipeline events for the terminal until the coordinator stops.
async fn print_events(mut events: mpsc::Receiver<PipelineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::Status(status) => match status {
                RecordingStatus::Recording => {
                    println!("recording... ('stop' sends, 'cancel' discards)");
                }
                RecordingStatus::Processing => println!("transcribing..."),
                RecordingStatus::Pasting => println!("delivering..."),
                RecordingStatus::Copied => println!("transcript copied to clipboard"),
                RecordingStatus::Cancelled => println!("cancelled"),
            },
            PipelineEvent::TranscriptionCompleted(outcome) => {
                if !outcome.success {
                    let message = outcome.error.as_deref().unwrap_or("transcription failed");
                    println!("!! {message}");
                } else if outcome.text.is_empty() {
                    println!("(no speech recognized)");
                } else {
                    println!("> {}", outcome.text);
                    if !outcome.injected {
                        if let Some(err) = &outcome.error {
                            println!("!! {err}");
                        }
                    }
                }
            }
            PipelineEvent::Error(message) => println!("!! {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Whisperkey starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads; recognition and delivery run on
    //    the blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Capture worker; owns the cpal stream and the scratch directory
    let paths = AppPaths::new();
    let (session, capture_events) = SessionManager::spawn(&config.audio, &paths.scratch_dir)
        .context("failed to start the audio capture worker")?;

    // 5. Pipeline collaborators
    let transcriber: Arc<dyn Transcriber> = Arc::new(CommandTranscriber::new(config.stt.clone()));
    let injector: Arc<dyn TextInjector> = Arc::new(ClipboardInjector::new(&config.inject));
    let history: Arc<dyn HistorySink> = Arc::new(MemoryHistory::default());
    let states = Arc::new(StateMachine::new());

    let (coordinator, events) = Coordinator::new(
        session,
        Conditioner::new(config.dsp.clone()),
        transcriber,
        injector,
        history,
        states,
        Duration::from_secs(config.pipeline.watchdog_secs),
        config.audio.sample_rate,
        config.stt.model.clone(),
    );

    // 6. Coordinator and event printer
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);
    let pipeline = rt.spawn(coordinator.run(command_rx, capture_events));
    rt.spawn(print_events(events));

    // 7. Gesture loop
    println!("whisperkey ready: start | stop | cancel | devices | quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match line.trim() {
            "" => continue,
            "start" => PipelineCommand::Start,
            "stop" => PipelineCommand::Stop,
            "cancel" => PipelineCommand::Cancel,
            "devices" => {
                let names = input_device_names();
                if names.is_empty() {
                    println!("no capture devices found");
                }
                for name in names {
                    println!("  {name}");
                }
                continue;
            }
            "quit" | "exit" => break,
            other => {
                println!("unknown command {other:?} (start | stop | cancel | devices | quit)");
                continue;
            }
        };
        if command_tx.blocking_send(command).is_err() {
            break;
        }
    }

    // Closing the command channel shuts the coordinator down: it discards
    // any unprocessed artifact and waits briefly for in-flight recognition
    // before returning.
    drop(command_tx);
    rt.block_on(pipeline).context("pipeline task panicked")?;
    log::info!("Whisperkey stopped");
    Ok(())
}
