//! Dictation coordinator: drives capture, conditioning, recognition, and
//! delivery as one loop.
//!
//! # Flow
//!
//! ```text
//! PipelineCommand (mpsc)          CaptureEvent (mpsc, from audio worker)
//!        │                               │
//!        ▼                               ▼
//! Coordinator::run()  ─── single tokio select loop ───
//!        │
//!        ├─ Start   → SessionManager::start()          [Recording]
//!        ├─ Stop    → SessionManager::stop()           [Stopping → Processing]
//!        ├─ Cancel  → SessionManager::cancel()         [Cancelled → Idle]
//!        │
//!        ├─ ArtifactReady → spawn: condition + transcribe (blocking,
//!        │                  bounded by a watchdog)      [Transcribing]
//!        └─ job done     → deliver text, record history [Injecting → Complete]
//! ```
//!
//! Every artifact carries the capture generation that produced it; results
//! whose generation no longer matches the coordinator's current dictation
//! are silently discarded.  That one check makes rapid start/stop/cancel
//! sequences safe: a superseded recognition can finish whenever it likes
//! without ever delivering text.
//!
//! The recognizer runs on `spawn_blocking` and cannot be interrupted, so a
//! stuck model is handled by abandoning it: the watchdog reports a timeout
//! to the user and the orphaned task cleans up its own artifact when it
//! eventually returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::audio::{CaptureError, CaptureEvent, SessionManager};
use crate::dsp::Conditioner;
use crate::history::{HistoryEntry, HistorySink};
use crate::inject::{Delivery, TextInjector};
use crate::stt::{SttError, Transcriber};
use crate::workflow::{StateMachine, WorkflowState};

use super::events::{PipelineCommand, PipelineEvent, RecordingStatus, TranscriptionOutcome};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Outbound event channel capacity.
const EVENT_CAPACITY: usize = 32;

/// How long shutdown waits for in-flight recognition before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Poll interval while draining in-flight work at shutdown.
const DRAIN_TICK: Duration = Duration::from_millis(100);

/// Grace period before the first artifact delete attempt; the recognizer
/// may not have released its file handle yet.
const CLEANUP_DELAY: Duration = Duration::from_millis(100);

/// Delete attempts per artifact, with doubling backoff between them.
const CLEANUP_RETRIES: u32 = 3;

/// Base backoff between delete attempts.
const CLEANUP_BACKOFF: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Internal job plumbing
// ---------------------------------------------------------------------------

/// What the blocking conditioning + recognition job produced.
struct JobOutput {
    text: String,
    duration_secs: f32,
}

/// Why a job produced nothing.
enum JobError {
    Recognizer(SttError),
    TimedOut(u64),
    Worker(String),
}

impl JobError {
    fn user_message(&self) -> String {
        match self {
            JobError::TimedOut(secs) => format!(
                "Transcription timed out after {secs} seconds. \
                 Try restarting the application or using a smaller model."
            ),
            JobError::Recognizer(err) => format!("Transcription error: {err}"),
            JobError::Worker(msg) => format!("Transcription error: {msg}"),
        }
    }
}

/// Completion message from a processing job back to the run loop.
struct Processed {
    generation: u64,
    path: PathBuf,
    outcome: Result<JobOutput, JobError>,
}

impl Processed {
    fn timed_out(&self) -> bool {
        matches!(self.outcome, Err(JobError::TimedOut(_)))
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns one dictation cycle at a time and serializes everything that touches
/// it.
///
/// Create with [`Coordinator::new`], then call [`run`](Self::run) inside a
/// tokio task with the command receiver and the capture event receiver from
/// [`SessionManager::spawn`].
pub struct Coordinator {
    session: SessionManager,
    conditioner: Conditioner,
    transcriber: Arc<dyn Transcriber>,
    injector: Arc<dyn TextInjector>,
    history: Arc<dyn HistorySink>,
    states: Arc<StateMachine>,
    events: mpsc::Sender<PipelineEvent>,
    watchdog: Duration,
    sample_rate: u32,
    model: String,
    /// Generation of the dictation currently owned by the coordinator.
    /// `None` whenever no capture/recognition is considered live.
    current: Option<u64>,
    /// Processing tasks that have not been observed finished yet.  Kept so
    /// shutdown can wait (bounded) for abandoned recognizers.
    jobs: Vec<(u64, JoinHandle<()>)>,
}

impl Coordinator {
    /// Wire up a coordinator.
    ///
    /// # Arguments
    ///
    /// * `session`: capture worker handle; `run` consumes its events.
    /// * `conditioner`: DSP stages applied to every artifact.
    /// * `transcriber` / `injector` / `history`: the three outward seams.
    /// * `states`: shared workflow state machine (also readable by a
    ///   frontend).
    /// * `watchdog`: upper bound on conditioning + recognition.
    /// * `sample_rate`: capture sample rate, for duration bookkeeping.
    /// * `model`: recognizer model name recorded into history.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: SessionManager,
        conditioner: Conditioner,
        transcriber: Arc<dyn Transcriber>,
        injector: Arc<dyn TextInjector>,
        history: Arc<dyn HistorySink>,
        states: Arc<StateMachine>,
        watchdog: Duration,
        sample_rate: u32,
        model: impl Into<String>,
    ) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let coordinator = Self {
            session,
            conditioner,
            transcriber,
            injector,
            history,
            states,
            events: event_tx,
            watchdog,
            sample_rate,
            model: model.into(),
            current: None,
            jobs: Vec::new(),
        };
        (coordinator, event_rx)
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run until the command channel closes, then shut down and return.
    ///
    /// Shutdown deletes any artifact still waiting on the capture channel
    /// instead of transcribing it (no text may reach a window after the
    /// frontend is gone), waits up to [`SHUTDOWN_GRACE`] for recognition
    /// tasks that are already running, and finally resets the workflow to
    /// idle.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<PipelineCommand>,
        mut capture: mpsc::Receiver<CaptureEvent>,
    ) {
        let (done_tx, mut done_rx) = mpsc::channel::<Processed>(4);

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd).await;
                }
                Some(event) = capture.recv() => {
                    self.handle_capture_event(event, &done_tx).await;
                }
                Some(done) = done_rx.recv() => {
                    self.handle_processed(done).await;
                }
            }
        }

        // Commands are gone.  Anything the capture worker already queued can
        // no longer complete a dictation; remove its artifact.
        while let Ok(event) = capture.try_recv() {
            self.discard_capture_event(event).await;
        }

        let deadline = time::Instant::now() + SHUTDOWN_GRACE;
        loop {
            self.jobs.retain(|(_, handle)| !handle.is_finished());
            if self.jobs.is_empty() {
                break;
            }
            let remaining = deadline.saturating_duration_since(time::Instant::now());
            if remaining.is_zero() {
                warn!("shutting down with recognition still in flight");
                break;
            }
            tokio::select! {
                Some(event) = capture.recv() => {
                    self.discard_capture_event(event).await;
                }
                Some(done) = done_rx.recv() => {
                    debug!(
                        "discarding recognition result for generation {} during shutdown",
                        done.generation
                    );
                    if !done.timed_out() {
                        cleanup_artifact(&done.path).await;
                    }
                }
                _ = time::sleep(remaining.min(DRAIN_TICK)) => {}
            }
        }

        self.states.reset();
        info!("pipeline coordinator stopped");
    }

    async fn handle_command(&mut self, command: PipelineCommand) {
        match command {
            PipelineCommand::Start => self.handle_start().await,
            PipelineCommand::Stop => self.handle_stop().await,
            PipelineCommand::Cancel => self.handle_cancel().await,
        }
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Begin a new dictation.  If the previous one is still anywhere in
    /// flight, it is abandoned first: a fresh gesture always wins.
    async fn handle_start(&mut self) {
        let state = self.states.current();
        if state != WorkflowState::Idle {
            warn!("start requested while {state:?}, abandoning previous dictation");
            let _ = self.session.cancel().await;
            self.current = None;
            self.states.reset();
        }

        match self.session.start().await {
            Ok(generation) => {
                self.current = Some(generation);
                self.states.try_transition(WorkflowState::Recording);
                self.emit(PipelineEvent::Status(RecordingStatus::Recording))
                    .await;
                info!("recording started (generation {generation})");
            }
            Err(err) => {
                warn!("could not start recording: {err}");
                self.emit(PipelineEvent::Error(capture_user_message(&err)))
                    .await;
            }
        }
    }

    /// Finalize the recording.  The artifact, if any, arrives as a capture
    /// event; this handler only covers the empty/too-short outcomes.
    async fn handle_stop(&mut self) {
        if !self.states.try_transition(WorkflowState::Stopping) {
            debug!("stop ignored in state {:?}", self.states.current());
            return;
        }
        self.emit(PipelineEvent::Status(RecordingStatus::Processing))
            .await;

        match self.session.stop().await {
            Ok(true) => {
                // ArtifactReady is already queued on the capture channel.
            }
            Ok(false) => {
                info!("recording too short, nothing to transcribe");
                self.current = None;
                self.finish_with_failure(
                    "No audio was captured. Hold the key a little longer.".into(),
                )
                .await;
            }
            Err(err) => {
                warn!("stop failed: {err}");
                self.current = None;
                self.finish_with_failure(format!("Recording failed: {err}"))
                    .await;
            }
        }
    }

    /// Abandon the current dictation wherever it is, as long as no text has
    /// started flowing toward the target window.
    async fn handle_cancel(&mut self) {
        match self.states.current() {
            WorkflowState::Recording | WorkflowState::Stopping | WorkflowState::Transcribing => {
                let _ = self.session.cancel().await;
                self.current = None;
                if self.states.try_transition(WorkflowState::Cancelled) {
                    self.emit(PipelineEvent::Status(RecordingStatus::Cancelled))
                        .await;
                    self.states.try_transition(WorkflowState::Idle);
                }
                info!("dictation cancelled");
            }
            other => debug!("cancel ignored in state {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Capture events and job completion
    // -----------------------------------------------------------------------

    async fn handle_capture_event(
        &mut self,
        event: CaptureEvent,
        done_tx: &mpsc::Sender<Processed>,
    ) {
        match event {
            CaptureEvent::ArtifactReady {
                generation,
                path,
                bytes,
            } => {
                if self.current != Some(generation) {
                    debug!("discarding artifact from superseded generation {generation}");
                    cleanup_artifact(&path).await;
                    return;
                }
                if !self.states.try_transition(WorkflowState::Transcribing) {
                    debug!(
                        "artifact for generation {generation} arrived in state {:?}, discarding",
                        self.states.current()
                    );
                    cleanup_artifact(&path).await;
                    return;
                }
                info!("artifact ready (generation {generation}, {bytes} bytes), transcribing");
                self.spawn_processing(generation, path, bytes, done_tx);
            }
            CaptureEvent::StreamFailed {
                generation,
                message,
            } => {
                if self.current != Some(generation) {
                    debug!("stream failure from superseded generation {generation}: {message}");
                    return;
                }
                warn!("input stream failed mid-recording: {message}");
                let _ = self.session.cancel().await;
                self.current = None;
                self.states.try_transition(WorkflowState::Error);
                self.emit(PipelineEvent::Error(format!("Recording failed: {message}")))
                    .await;
                self.states.try_transition(WorkflowState::Idle);
            }
        }
    }

    /// Shutdown path: the dictation can no longer complete, so an artifact
    /// is deleted rather than transcribed.
    async fn discard_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::ArtifactReady {
                generation, path, ..
            } => {
                debug!("removing artifact from generation {generation} during shutdown");
                cleanup_artifact(&path).await;
            }
            CaptureEvent::StreamFailed {
                generation,
                message,
            } => {
                debug!("stream failure from generation {generation} during shutdown: {message}");
            }
        }
    }

    /// Condition and recognize `path` on the blocking pool, bounded by the
    /// watchdog.  Timed-out jobs report once and then clean up after
    /// themselves whenever the recognizer finally returns.
    fn spawn_processing(
        &mut self,
        generation: u64,
        path: PathBuf,
        bytes: u64,
        done_tx: &mpsc::Sender<Processed>,
    ) {
        let conditioner = self.conditioner.clone();
        let transcriber = Arc::clone(&self.transcriber);
        let watchdog = self.watchdog;
        let sample_rate = self.sample_rate;
        let done = done_tx.clone();

        self.jobs.retain(|(_, handle)| !handle.is_finished());

        let handle = tokio::spawn(async move {
            let work_path = path.clone();
            let mut work = tokio::task::spawn_blocking(move || {
                let duration_secs = match conditioner.condition_file(&work_path) {
                    Ok(stats) => stats.output_samples as f32 / sample_rate as f32,
                    Err(err) => {
                        // Conditioning is an enhancement; recognize the raw
                        // artifact rather than failing the dictation.
                        warn!("conditioning failed, recognizing raw audio: {err}");
                        (bytes.saturating_sub(44) / 2) as f32 / sample_rate as f32
                    }
                };
                let text = transcriber.transcribe(&work_path)?;
                Ok(JobOutput {
                    text,
                    duration_secs,
                })
            });

            let outcome = match time::timeout(watchdog, &mut work).await {
                Ok(Ok(result)) => result.map_err(JobError::Recognizer),
                Ok(Err(join_err)) => Err(JobError::Worker(join_err.to_string())),
                Err(_elapsed) => {
                    let _ = done
                        .send(Processed {
                            generation,
                            path: path.clone(),
                            outcome: Err(JobError::TimedOut(watchdog.as_secs())),
                        })
                        .await;
                    // The blocking call cannot be interrupted.  Wait it out,
                    // discard whatever it produced, and remove the artifact.
                    let _ = work.await;
                    debug!("late recognition result for generation {generation} discarded");
                    cleanup_artifact(&path).await;
                    return;
                }
            };

            let _ = done
                .send(Processed {
                    generation,
                    path,
                    outcome,
                })
                .await;
        });
        self.jobs.push((generation, handle));
    }

    async fn handle_processed(&mut self, done: Processed) {
        let timed_out = done.timed_out();

        if self.current != Some(done.generation) {
            debug!(
                "discarding recognition result for superseded generation {}",
                done.generation
            );
            if !timed_out {
                cleanup_artifact(&done.path).await;
            }
            return;
        }
        self.current = None;

        match done.outcome {
            Ok(output) => {
                cleanup_artifact(&done.path).await;
                self.finish_success(output).await;
            }
            Err(err) => {
                // Timed-out jobs delete their own artifact once the stuck
                // recognizer returns.
                if !timed_out {
                    cleanup_artifact(&done.path).await;
                }
                self.finish_with_failure(err.user_message()).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cycle completion
    // -----------------------------------------------------------------------

    async fn finish_success(&mut self, output: JobOutput) {
        let text = output.text.trim().to_string();

        // The workflow has no transcribe-to-complete edge; an empty result
        // passes through Injecting without delivering anything.
        self.states.try_transition(WorkflowState::Injecting);

        if text.is_empty() {
            info!("recognizer returned no text");
            self.emit(PipelineEvent::TranscriptionCompleted(TranscriptionOutcome {
                text,
                success: true,
                error: None,
                entry: None,
                injected: false,
            }))
            .await;
        } else {
            self.emit(PipelineEvent::Status(RecordingStatus::Pasting))
                .await;

            let injector = Arc::clone(&self.injector);
            let to_deliver = text.clone();
            let delivered =
                tokio::task::spawn_blocking(move || injector.inject(&to_deliver)).await;

            let (injected, error) = match delivered {
                Ok(Ok(Delivery::Pasted)) => (true, None),
                Ok(Ok(Delivery::Copied)) => {
                    self.emit(PipelineEvent::Status(RecordingStatus::Copied))
                        .await;
                    (true, None)
                }
                Ok(Err(err)) => {
                    warn!("delivery failed: {err}");
                    (false, Some(format!("Text delivery failed: {err}")))
                }
                Err(join_err) => {
                    warn!("injection task failed: {join_err}");
                    (false, Some(format!("Text delivery failed: {join_err}")))
                }
            };

            let entry = HistoryEntry::new(text.clone(), output.duration_secs, self.model.as_str());
            self.history.record(entry.clone());
            info!(
                "transcription complete ({} words, {:.1}s of audio)",
                entry.word_count, entry.duration_secs
            );

            self.emit(PipelineEvent::TranscriptionCompleted(TranscriptionOutcome {
                text,
                success: true,
                error,
                entry: Some(entry),
                injected,
            }))
            .await;
        }

        self.states.try_transition(WorkflowState::Complete);
        self.states.try_transition(WorkflowState::Idle);
    }

    async fn finish_with_failure(&mut self, message: String) {
        self.states.try_transition(WorkflowState::Error);
        self.emit(PipelineEvent::TranscriptionCompleted(TranscriptionOutcome {
            text: String::new(),
            success: false,
            error: Some(message),
            entry: None,
            injected: false,
        }))
        .await;
        self.states.try_transition(WorkflowState::Idle);
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).await.is_err() {
            debug!("pipeline event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a capture failure onto the message shown to the user.
fn capture_user_message(err: &CaptureError) -> String {
    match err {
        CaptureError::NoDevice => {
            "No microphone detected. Please connect a microphone and try again.".into()
        }
        CaptureError::DefaultConfig(_)
        | CaptureError::BuildStream(_)
        | CaptureError::PlayStream(_)
        | CaptureError::UnsupportedFormat(_) => {
            "Failed to access the microphone. Please check if another application is using it."
                .into()
        }
        other => format!("Recording failed: {other}"),
    }
}

/// Remove a finished artifact from the scratch directory.
///
/// The recognizer may hold the file open a moment after returning, so the
/// first attempt waits out [`CLEANUP_DELAY`] and failures are retried with
/// doubling backoff.  A missing file counts as success.
async fn cleanup_artifact(path: &Path) {
    time::sleep(CLEANUP_DELAY).await;
    for attempt in 0..CLEANUP_RETRIES {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("removed artifact {}", path.display());
                return;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
            Err(err) => {
                if attempt + 1 == CLEANUP_RETRIES {
                    warn!("could not remove artifact {}: {err}", path.display());
                    return;
                }
                time::sleep(CLEANUP_BACKOFF * 2u32.pow(attempt)).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use crate::audio::session::script::CaptureScript;
    use crate::audio::write_samples;
    use crate::config::DspConfig;
    use crate::history::MemoryHistory;
    use crate::inject::MockInjector;
    use crate::stt::MockTranscriber;

    const RATE: u32 = 16_000;

    /// Half a second of quiet tone; loud enough that no conditioning stage
    /// empties it.
    fn write_tone(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let samples: Vec<f32> = (0..RATE / 2)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect();
        let path = dir.path().join(name);
        write_samples(&path, &samples, RATE).unwrap();
        path
    }

    #[allow(clippy::type_complexity)]
    fn build(
        script: CaptureScript,
        transcriber: Arc<dyn Transcriber>,
        injector: Arc<dyn TextInjector>,
        watchdog: Duration,
    ) -> (
        Coordinator,
        mpsc::Receiver<PipelineEvent>,
        mpsc::Receiver<CaptureEvent>,
        Arc<Mutex<Vec<String>>>,
        Arc<StateMachine>,
        Arc<MemoryHistory>,
    ) {
        let (session, capture_rx, calls) = SessionManager::scripted(script);
        let states = Arc::new(StateMachine::new());
        let history = Arc::new(MemoryHistory::default());
        let conditioner = Conditioner::new(DspConfig::default());

        let (coordinator, events) = Coordinator::new(
            session,
            conditioner,
            transcriber,
            injector,
            Arc::clone(&history) as Arc<dyn HistorySink>,
            Arc::clone(&states),
            watchdog,
            RATE,
            "ggml-small.bin",
        );
        (coordinator, events, capture_rx, calls, states, history)
    }

    /// Receive events until a completion arrives (bounded), returning
    /// everything seen including the completion itself.
    async fn recv_until_completion(
        events: &mut mpsc::Receiver<PipelineEvent>,
    ) -> Vec<PipelineEvent> {
        let mut seen = Vec::new();
        loop {
            match time::timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Some(event)) => {
                    let done = matches!(event, PipelineEvent::TranscriptionCompleted(_));
                    seen.push(event);
                    if done {
                        return seen;
                    }
                }
                other => panic!("pipeline stalled without completing: {other:?}"),
            }
        }
    }

    /// Receive events until an error arrives (bounded).
    async fn recv_until_error(events: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut seen = Vec::new();
        loop {
            match time::timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Some(event)) => {
                    let done = matches!(event, PipelineEvent::Error(_));
                    seen.push(event);
                    if done {
                        return seen;
                    }
                }
                other => panic!("pipeline never reported an error: {other:?}"),
            }
        }
    }

    fn drain(events: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn statuses(events: &[PipelineEvent]) -> Vec<RecordingStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn completions(events: &[PipelineEvent]) -> Vec<&TranscriptionOutcome> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::TranscriptionCompleted(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    fn errors(events: &[PipelineEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Error(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    /// Press, speak, release: the transcript is conditioned, recognized,
    /// pasted, and recorded in history, and the artifact is gone afterwards.
    #[tokio::test]
    async fn full_cycle_delivers_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "a.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        let transcriber = MockTranscriber::ok("hello world");
        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, calls, states, history) = build(
            script,
            Arc::new(transcriber),
            Arc::new(injector),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        assert_eq!(
            statuses(&seen),
            [
                RecordingStatus::Recording,
                RecordingStatus::Processing,
                RecordingStatus::Pasting,
            ]
        );

        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        let outcome = completed[0];
        assert!(outcome.success);
        assert_eq!(outcome.text, "hello world");
        assert!(outcome.injected);
        assert!(outcome.error.is_none());
        let entry = outcome.entry.as_ref().unwrap();
        assert_eq!(entry.word_count, 2);
        assert_eq!(entry.model, "ggml-small.bin");
        assert!((entry.duration_secs - 0.5).abs() < 0.05);

        assert_eq!(*injected.lock().unwrap(), ["hello world"]);
        assert_eq!(history.len(), 1);
        assert_eq!(*calls.lock().unwrap(), ["start", "stop"]);
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!artifact.exists());
    }

    /// Cancel between press and release: no recognition, no injection, no
    /// history, back to idle.
    #[tokio::test]
    async fn cancel_discards_the_recording() {
        let transcriber = MockTranscriber::ok("should never appear");
        let recognitions = transcriber.counter();
        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, calls, states, history) = build(
            CaptureScript::new(),
            Arc::new(transcriber),
            Arc::new(injector),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Cancel).await.unwrap();
        drop(tx);
        coordinator.run(rx, capture_rx).await;

        let seen = drain(&mut events);
        assert_eq!(
            statuses(&seen),
            [RecordingStatus::Recording, RecordingStatus::Cancelled]
        );
        assert!(completions(&seen).is_empty());
        assert_eq!(recognitions.load(Ordering::SeqCst), 0);
        assert!(injected.lock().unwrap().is_empty());
        assert!(history.is_empty());
        assert_eq!(*calls.lock().unwrap(), ["start", "cancel"]);
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// A cancel racing the finalized artifact: whichever order the events
    /// land in, no text is ever delivered and the artifact is removed.
    #[tokio::test]
    async fn cancel_after_stop_never_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "raced.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, _calls, states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("too late")),
            Arc::new(injector),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        tx.send(PipelineCommand::Cancel).await.unwrap();
        drop(tx);
        coordinator.run(rx, capture_rx).await;

        let seen = drain(&mut events);
        assert!(completions(&seen).is_empty());
        assert!(injected.lock().unwrap().is_empty());
        assert!(history.is_empty());
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!artifact.exists());
    }

    /// Recognizer failure surfaces exactly one completion with a user
    /// message, and the artifact is still cleaned up.
    #[tokio::test]
    async fn recognizer_failure_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "bad.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        let (coordinator, mut events, capture_rx, _calls, states, history) = build(
            script,
            Arc::new(MockTranscriber::err(SttError::Transcription(
                "model exploded".into(),
            ))),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].success);
        let message = completed[0].error.as_deref().unwrap();
        assert!(message.contains("Transcription error"));
        assert!(message.contains("model exploded"));
        assert!(history.is_empty());
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!artifact.exists());
    }

    /// A recognizer that outlives the watchdog is abandoned: the user gets a
    /// timeout message promptly, nothing is delivered, and the orphaned job
    /// removes the artifact once it finally returns.
    #[tokio::test]
    async fn watchdog_abandons_stuck_recognizer() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "slow.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        let transcriber = MockTranscriber::slow(Duration::from_millis(400), "late text");
        let recognitions = transcriber.counter();
        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, _calls, states, history) = build(
            script,
            Arc::new(transcriber),
            Arc::new(injector),
            Duration::from_millis(50),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        // run() waits out the orphaned recognizer before returning.
        runner.await.unwrap();

        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].success);
        assert!(completed[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out after"));

        assert_eq!(recognitions.load(Ordering::SeqCst), 1);
        assert!(injected.lock().unwrap().is_empty());
        assert!(history.is_empty());
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!artifact.exists());
    }

    /// Releasing the key almost immediately produces no artifact; the user
    /// is told to hold it longer and the recognizer is never invoked.
    #[tokio::test]
    async fn too_short_recording_reports_error() {
        let mut script = CaptureScript::new();
        script.stop_produces.push_back(None);

        let transcriber = MockTranscriber::ok("phantom");
        let recognitions = transcriber.counter();

        let (coordinator, mut events, capture_rx, _calls, states, _history) = build(
            script,
            Arc::new(transcriber),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        drop(tx);
        coordinator.run(rx, capture_rx).await;

        let seen = drain(&mut events);
        assert_eq!(
            statuses(&seen),
            [RecordingStatus::Recording, RecordingStatus::Processing]
        );
        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(!completed[0].success);
        assert_eq!(
            completed[0].error.as_deref(),
            Some("No audio was captured. Hold the key a little longer.")
        );
        assert_eq!(recognitions.load(Ordering::SeqCst), 0);
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// Whitespace-only recognition completes successfully with nothing
    /// delivered and nothing recorded.
    #[tokio::test]
    async fn empty_transcription_completes_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "quiet.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, _calls, states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("   ")),
            Arc::new(injector),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        assert_eq!(
            statuses(&seen),
            [RecordingStatus::Recording, RecordingStatus::Processing]
        );
        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(completed[0].success);
        assert!(completed[0].text.is_empty());
        assert!(!completed[0].injected);
        assert!(completed[0].entry.is_none());
        assert!(injected.lock().unwrap().is_empty());
        assert!(history.is_empty());
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// Copy-only delivery surfaces the Copied status and still counts as
    /// injected.
    #[tokio::test]
    async fn copy_only_delivery_reports_copied() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "copy.wav");

        let mut script = CaptureScript::new();
        script.stop_produces.push_back(Some((artifact, 16_044)));

        let (coordinator, mut events, capture_rx, _calls, _states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("clipboard bound")),
            Arc::new(MockInjector::copying()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        assert_eq!(
            statuses(&seen),
            [
                RecordingStatus::Recording,
                RecordingStatus::Processing,
                RecordingStatus::Pasting,
                RecordingStatus::Copied,
            ]
        );
        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(completed[0].injected);
        assert_eq!(history.len(), 1);
    }

    /// Delivery failure does not lose the transcript: the completion still
    /// carries the text and the history entry, with a delivery error noted.
    #[tokio::test]
    async fn delivery_failure_keeps_the_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "undelivered.wav");

        let mut script = CaptureScript::new();
        script.stop_produces.push_back(Some((artifact, 16_044)));

        let (coordinator, mut events, capture_rx, _calls, _states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("precious words")),
            Arc::new(MockInjector::failing("no display")),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        let outcome = completed[0];
        assert!(outcome.success);
        assert_eq!(outcome.text, "precious words");
        assert!(!outcome.injected);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("Text delivery failed"));
        assert_eq!(history.len(), 1);
    }

    /// No microphone at start: a single user-facing error, no status chatter,
    /// and the workflow never leaves idle.
    #[tokio::test]
    async fn start_failure_stays_idle() {
        let mut script = CaptureScript::new();
        script.start_fails = true;

        let (coordinator, mut events, capture_rx, calls, states, _history) = build(
            script,
            Arc::new(MockTranscriber::ok("unreachable")),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(PipelineCommand::Start).await.unwrap();
        drop(tx);
        coordinator.run(rx, capture_rx).await;

        let seen = drain(&mut events);
        assert!(statuses(&seen).is_empty());
        assert_eq!(
            errors(&seen),
            ["No microphone detected. Please connect a microphone and try again."]
        );
        assert_eq!(*calls.lock().unwrap(), ["start"]);
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// The device dying mid-recording surfaces one error and resets to idle.
    #[tokio::test]
    async fn stream_death_mid_recording_resets() {
        let mut script = CaptureScript::new();
        script.fail_stream_on_start = true;

        let (coordinator, mut events, capture_rx, calls, states, _history) = build(
            script,
            Arc::new(MockTranscriber::ok("unreachable")),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();

        let seen = recv_until_error(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        assert_eq!(statuses(&seen), [RecordingStatus::Recording]);
        let reported = errors(&seen);
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("device unplugged"));
        assert_eq!(*calls.lock().unwrap(), ["start", "cancel"]);
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// Pressing the key again while a recording is live abandons the first
    /// recording and starts fresh.
    #[tokio::test]
    async fn restart_while_recording_forces_reset() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "second.wav");

        let mut script = CaptureScript::new();
        script.stop_produces.push_back(Some((artifact, 16_044)));

        let (coordinator, mut events, capture_rx, calls, states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("take two")),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        assert_eq!(
            statuses(&seen),
            [
                RecordingStatus::Recording,
                RecordingStatus::Recording,
                RecordingStatus::Processing,
                RecordingStatus::Pasting,
            ]
        );
        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].text, "take two");
        assert_eq!(*calls.lock().unwrap(), ["start", "cancel", "start", "stop"]);
        assert_eq!(history.len(), 1);
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// Starting a new dictation while the previous one is still in the
    /// recognizer abandons the old result: exactly one transcript comes out.
    #[tokio::test]
    async fn restart_supersedes_inflight_recognition() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_tone(&dir, "first.wav");
        let second = write_tone(&dir, "second.wav");

        let mut script = CaptureScript::new();
        script.stop_produces.push_back(Some((first.clone(), 16_044)));
        script
            .stop_produces
            .push_back(Some((second.clone(), 16_044)));

        let transcriber = MockTranscriber::slow(Duration::from_millis(300), "whichever");
        let recognitions = transcriber.counter();

        let (coordinator, mut events, capture_rx, calls, states, history) = build(
            script,
            Arc::new(transcriber),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));

        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        // Give the first artifact time to reach the recognizer, which then
        // sits in its 300 ms sleep.
        time::sleep(Duration::from_millis(100)).await;
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();

        let seen = recv_until_completion(&mut events).await;
        drop(tx);
        runner.await.unwrap();

        let completed = completions(&seen);
        assert_eq!(completed.len(), 1);
        assert!(completed[0].success);
        assert_eq!(recognitions.load(Ordering::SeqCst), 2);
        assert_eq!(history.len(), 1);
        assert_eq!(
            *calls.lock().unwrap(),
            ["start", "stop", "cancel", "start", "stop"]
        );
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!first.exists());
        assert!(!second.exists());
    }

    /// Three clean cycles back to back, each waited to completion, all
    /// deliver independently.
    #[tokio::test]
    async fn back_to_back_cycles_each_deliver() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = CaptureScript::new();
        for name in ["one.wav", "two.wav", "three.wav"] {
            script
                .stop_produces
                .push_back(Some((write_tone(&dir, name), 16_044)));
        }

        let (coordinator, mut events, capture_rx, calls, states, history) = build(
            script,
            Arc::new(MockTranscriber::ok("again")),
            Arc::new(MockInjector::pasting()),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(coordinator.run(rx, capture_rx));

        for cycle in 0..3 {
            tx.send(PipelineCommand::Start).await.unwrap();
            tx.send(PipelineCommand::Stop).await.unwrap();
            let seen = recv_until_completion(&mut events).await;
            let completed = completions(&seen);
            assert_eq!(completed.len(), 1, "cycle {cycle}");
            assert!(completed[0].success, "cycle {cycle}: {:?}", completed[0]);
        }
        drop(tx);
        runner.await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(
            *calls.lock().unwrap(),
            ["start", "stop", "start", "stop", "start", "stop"]
        );
        assert_eq!(states.current(), WorkflowState::Idle);
    }

    /// An artifact still in flight when the frontend disappears is deleted,
    /// never transcribed to completion: no injection, no history.
    #[tokio::test]
    async fn abrupt_close_never_delivers() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = write_tone(&dir, "leftover.wav");

        let mut script = CaptureScript::new();
        script
            .stop_produces
            .push_back(Some((artifact.clone(), 16_044)));

        // Slow enough that recognition cannot finish before the coordinator
        // observes the closed command channel.
        let transcriber = MockTranscriber::slow(Duration::from_millis(100), "never spoken");
        let injector = MockInjector::pasting();
        let injected = injector.texts();

        let (coordinator, mut events, capture_rx, _calls, states, history) = build(
            script,
            Arc::new(transcriber),
            Arc::new(injector),
            Duration::from_secs(10),
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        drop(tx);
        coordinator.run(rx, capture_rx).await;

        let seen = drain(&mut events);
        assert!(completions(&seen).is_empty());
        assert!(injected.lock().unwrap().is_empty());
        assert!(history.is_empty());
        assert_eq!(states.current(), WorkflowState::Idle);
        assert!(!artifact.exists());
    }
}
