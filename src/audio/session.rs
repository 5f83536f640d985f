//! Capture session manager.
//!
//! [`SessionManager`] owns microphone capture for the whole application.  A
//! `cpal::Stream` is not `Send`, so all stream handles live on a dedicated
//! worker thread; the public async methods send commands over a channel and
//! await a oneshot reply.  Finalized recordings are announced as
//! [`CaptureEvent`]s on a bounded channel so the pipeline can react without
//! polling.
//!
//! # Session identity
//!
//! Every `start` opens the device fresh and bumps a monotonic *generation*
//! counter.  The generation, the accepting flag, and the sample buffer sit
//! behind a single mutex; audio callbacks capture their generation by value
//! when the stream is built and revalidate it under the lock before touching
//! the buffer.  A callback from a superseded stream therefore cannot write
//! into a newer session's buffer, no matter how the OS interleaves delivery.
//!
//! # Lifecycle of one recording
//!
//! ```text
//! start ─▶ open device, bump generation, reset buffer, build stream
//!   │        (callbacks: downmix ─▶ resample ─▶ quantize ─▶ append)
//! stop  ─▶ flip accepting off, take buffer, drop stream,
//!          encode WAV, persist to scratch, emit ArtifactReady
//! cancel ─▶ flip accepting off, clear buffer, drop stream, no event
//! ```
//!
//! Recordings shorter than [`MIN_ARTIFACT_BYTES`](crate::audio::wav::MIN_ARTIFACT_BYTES)
//! of encoded WAV are discarded at stop: no file is written and no event is
//! emitted.  The worker also sweeps the scratch directory periodically,
//! deleting artifacts older than the configured retention (always keeping
//! the newest one, which may still be in flight through the pipeline).

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc as event_mpsc;
use tokio::sync::oneshot;

use crate::audio::convert::{downmix_to_mono, quantize, resample};
use crate::audio::device::{self, CaptureError, InputDevice};
use crate::audio::wav::{WavBuffer, MIN_ARTIFACT_BYTES};
use crate::config::AudioConfig;

/// Applied to every sample before quantization; slightly below unity so hot
/// microphones keep headroom for the conditioning stage.
const INPUT_VOLUME_SCALE: f32 = 0.8;

/// How often the worker sweeps the scratch directory while idle.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Capacity of the [`CaptureEvent`] channel.
const EVENT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

/// Notifications emitted by the capture worker.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A recording was finalized and written to the scratch directory.
    ArtifactReady {
        /// Generation of the session that produced this artifact.
        generation: u64,
        /// Absolute path of the WAV file in the scratch directory.
        path: PathBuf,
        /// Encoded size in bytes.
        bytes: u64,
    },
    /// The input stream failed mid-recording (device unplugged or claimed
    /// by another application).  The session keeps whatever was captured
    /// before the failure; a later `stop` finalizes it as usual.
    StreamFailed {
        /// Generation of the session whose stream failed.
        generation: u64,
        /// Platform error description for logging and user display.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Handle to the capture worker thread.
///
/// Cloneable it is not: the pipeline coordinator owns the single handle and
/// serializes start/stop/cancel through its own event loop.  Dropping the
/// manager shuts the worker down and joins it.
///
/// # Example
///
/// ```rust,no_run
/// use whisperkey::audio::SessionManager;
/// use whisperkey::config::AudioConfig;
///
/// # async fn demo() -> Result<(), whisperkey::audio::CaptureError> {
/// let audio = AudioConfig::default();
/// let (manager, mut events) = SessionManager::spawn(&audio, "/tmp/scratch".as_ref())?;
///
/// let generation = manager.start().await?;
/// // ... user holds the key ...
/// if manager.stop().await? {
///     // an ArtifactReady event with `generation` is now queued on `events`
///     let _event = events.recv().await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
}

enum Command {
    Start {
        reply: oneshot::Sender<Result<u64, CaptureError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<bool, CaptureError>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<(), CaptureError>>,
    },
    Shutdown,
}

impl SessionManager {
    /// Spawn the capture worker thread.
    ///
    /// Creates `scratch_dir` if it does not exist.  Returns the manager
    /// together with the receiving end of the [`CaptureEvent`] channel.
    ///
    /// The input device itself is opened lazily on each [`start`], so a
    /// microphone plugged in after spawn is picked up without a restart.
    ///
    /// [`start`]: SessionManager::start
    pub fn spawn(
        audio: &AudioConfig,
        scratch_dir: &Path,
    ) -> Result<(Self, event_mpsc::Receiver<CaptureEvent>), CaptureError> {
        std::fs::create_dir_all(scratch_dir)?;

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = event_mpsc::channel(EVENT_CAPACITY);

        let max_samples = (audio.sample_rate as f64 * audio.max_recording_secs as f64) as usize;
        let shared = Arc::new(Mutex::new(SharedState {
            generation: 0,
            accepting: false,
            buffer: WavBuffer::new(audio.sample_rate),
            overflowed: false,
        }));
        let scratch_dir = scratch_dir.to_path_buf();
        let device_name = audio.device.clone();
        let target_rate = audio.sample_rate;
        let retention = Duration::from_secs(audio.retention_minutes * 60);

        // `Worker` holds the non-`Send` stream slot, so it must be built on
        // the worker thread itself; only `Send` parts cross the spawn.
        let handle = thread::Builder::new()
            .name("capture-worker".into())
            .spawn(move || {
                let worker = Worker {
                    commands: cmd_rx,
                    events: event_tx,
                    shared,
                    stream: None,
                    scratch_dir,
                    device_name,
                    target_rate,
                    max_samples,
                    retention,
                    next_generation: 0,
                };
                worker.run()
            })?;

        Ok((
            Self {
                commands: cmd_tx,
                worker: Some(handle),
            },
            event_rx,
        ))
    }

    /// Begin a new capture session and return its generation.
    ///
    /// If a session is already active it is discarded first (its samples are
    /// dropped, no artifact is produced).
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no microphone is present, the cpal
    /// stream errors when the device rejects the configuration, or
    /// [`CaptureError::WorkerGone`] when the worker thread has exited.
    pub async fn start(&self) -> Result<u64, CaptureError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start { reply: tx })?;
        rx.await.map_err(|_| CaptureError::WorkerGone)?
    }

    /// Finalize the active session.
    ///
    /// Returns `Ok(true)` when an artifact was persisted (an
    /// [`CaptureEvent::ArtifactReady`] is queued on the event channel before
    /// this returns) and `Ok(false)` when the recording was empty or below
    /// the minimum artifact size, in which case no event is emitted.
    ///
    /// Stopping with no active session is not an error; it returns
    /// `Ok(false)`.
    pub async fn stop(&self) -> Result<bool, CaptureError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop { reply: tx })?;
        rx.await.map_err(|_| CaptureError::WorkerGone)?
    }

    /// Discard the active session without producing an artifact.
    ///
    /// Idempotent: cancelling when nothing is recording succeeds.
    pub async fn cancel(&self) -> Result<(), CaptureError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Cancel { reply: tx })?;
        rx.await.map_err(|_| CaptureError::WorkerGone)?
    }

    fn send(&self, command: Command) -> Result<(), CaptureError> {
        self.commands
            .send(command)
            .map_err(|_| CaptureError::WorkerGone)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// State shared between the worker thread and the audio callbacks.
///
/// One mutex guards all three fields so a callback's generation check and
/// its buffer append are a single atomic step.
struct SharedState {
    generation: u64,
    accepting: bool,
    buffer: WavBuffer,
    overflowed: bool,
}

struct Worker {
    commands: mpsc::Receiver<Command>,
    events: event_mpsc::Sender<CaptureEvent>,
    shared: Arc<Mutex<SharedState>>,
    /// Live stream handle.  `cpal::Stream` is not `Send`, which is the whole
    /// reason this worker thread exists.
    stream: Option<cpal::Stream>,
    scratch_dir: PathBuf,
    device_name: Option<String>,
    target_rate: u32,
    max_samples: usize,
    retention: Duration,
    next_generation: u64,
}

impl Worker {
    fn run(mut self) {
        log::debug!("capture worker started");
        self.sweep();

        loop {
            match self.commands.recv_timeout(SWEEP_INTERVAL) {
                Ok(Command::Start { reply }) => {
                    let _ = reply.send(self.handle_start());
                }
                Ok(Command::Stop { reply }) => {
                    let _ = reply.send(self.handle_stop());
                }
                Ok(Command::Cancel { reply }) => {
                    let _ = reply.send(self.handle_cancel());
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => self.sweep(),
            }
        }

        self.stream = None;
        log::debug!("capture worker stopped");
    }

    fn handle_start(&mut self) -> Result<u64, CaptureError> {
        if self.stream.is_some() {
            log::warn!("start requested while capture is active, discarding in-progress recording");
            self.discard_active();
        }

        let input = device::open_input(self.device_name.as_deref())?;

        self.next_generation += 1;
        let generation = self.next_generation;

        // The new identity must be visible before the stream exists; the
        // first callback can fire as soon as play() returns.
        {
            let mut state = self.shared.lock().unwrap();
            state.generation = generation;
            state.accepting = true;
            state.buffer = WavBuffer::new(self.target_rate);
            state.overflowed = false;
        }

        let stream = self.build_stream(&input, generation)?;
        self.stream = Some(stream);

        log::info!(
            "capture generation {generation} started on \"{}\" ({} Hz, {} ch, {:?})",
            input.name,
            input.sample_rate,
            input.channels,
            input.sample_format
        );
        Ok(generation)
    }

    fn handle_stop(&mut self) -> Result<bool, CaptureError> {
        let (buffer, generation, overflowed) = {
            let mut state = self.shared.lock().unwrap();
            state.accepting = false;
            let buffer = std::mem::replace(&mut state.buffer, WavBuffer::new(self.target_rate));
            (buffer, state.generation, state.overflowed)
        };

        // Drop the stream only after releasing the lock: stream teardown can
        // wait for an in-flight callback that itself needs the lock.
        if self.stream.take().is_none() {
            log::debug!("stop requested with no active capture session");
        }
        if overflowed {
            log::info!("recording was truncated at the duration cap before stop");
        }

        persist_artifact(buffer, generation, &self.scratch_dir, &self.events)
    }

    fn handle_cancel(&mut self) -> Result<(), CaptureError> {
        let generation = {
            let mut state = self.shared.lock().unwrap();
            state.accepting = false;
            state.buffer = WavBuffer::new(self.target_rate);
            state.generation
        };

        match self.stream.take() {
            Some(_stream) => log::info!("capture generation {generation} cancelled"),
            None => log::debug!("cancel requested with no active capture session"),
        }
        Ok(())
    }

    /// Invalidate and drop the current session without finalizing it.
    fn discard_active(&mut self) {
        {
            let mut state = self.shared.lock().unwrap();
            state.accepting = false;
            state.buffer = WavBuffer::new(self.target_rate);
        }
        self.stream = None;
    }

    fn build_stream(
        &self,
        input: &InputDevice,
        generation: u64,
    ) -> Result<cpal::Stream, CaptureError> {
        let shared = Arc::clone(&self.shared);
        let channels = input.channels;
        let native_rate = input.sample_rate;
        let target_rate = self.target_rate;
        let max_samples = self.max_samples;

        let on_chunk = move |chunk: Vec<f32>| {
            // Convert before taking the lock; only the append is guarded.
            let mono = downmix_to_mono(&chunk, channels);
            let resampled = resample(&mono, native_rate, target_rate);
            let pcm = quantize(&resampled, INPUT_VOLUME_SCALE);

            let Ok(mut state) = shared.lock() else { return };
            append_converted(&mut state, generation, &pcm, max_samples);
        };

        let err_shared = Arc::clone(&self.shared);
        let err_events = self.events.clone();
        let on_error = move |err: cpal::StreamError| {
            log::error!("audio stream error: {err}");
            let Ok(mut state) = err_shared.lock() else { return };
            if state.generation != generation {
                return;
            }
            state.accepting = false;
            // Release the lock before the channel send; a full channel would
            // otherwise stall the audio thread while holding it.
            drop(state);
            let _ = err_events.blocking_send(CaptureEvent::StreamFailed {
                generation,
                message: err.to_string(),
            });
        };

        device::build_input_stream(input, on_chunk, on_error)
    }

    fn sweep(&self) {
        let removed = sweep_scratch(&self.scratch_dir, self.retention);
        if removed > 0 {
            log::info!("removed {removed} expired recording(s) from scratch");
        }
    }
}

// ---------------------------------------------------------------------------
// Callback append path
// ---------------------------------------------------------------------------

/// Append a converted chunk to the session buffer.
///
/// Called with the session lock held.  Chunks from a stale generation or a
/// session that stopped accepting are dropped; a chunk that crosses
/// `max_samples` is truncated and closes the buffer to further input.
fn append_converted(state: &mut SharedState, generation: u64, pcm: &[i16], max_samples: usize) {
    if state.generation != generation {
        log::debug!(
            "dropping {} samples from stale capture generation {generation}",
            pcm.len()
        );
        return;
    }
    if !state.accepting {
        return;
    }

    let remaining = max_samples.saturating_sub(state.buffer.len());
    if pcm.len() < remaining {
        state.buffer.append(pcm);
    } else {
        state.buffer.append(&pcm[..remaining]);
        state.accepting = false;
        if !state.overflowed {
            state.overflowed = true;
            log::warn!("recording reached the maximum duration, ignoring further input");
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact persistence
// ---------------------------------------------------------------------------

/// Encode `buffer` and write it to the scratch directory, emitting
/// [`CaptureEvent::ArtifactReady`] on success.
///
/// Returns `Ok(false)` without writing or emitting anything when the buffer
/// is empty or the encoded WAV is at or below the minimum artifact size.
fn persist_artifact(
    buffer: WavBuffer,
    generation: u64,
    scratch_dir: &Path,
    events: &event_mpsc::Sender<CaptureEvent>,
) -> Result<bool, CaptureError> {
    if buffer.is_empty() {
        log::debug!("capture generation {generation} produced no audio");
        return Ok(false);
    }

    let duration = buffer.duration_secs();
    let encoded = buffer.encode()?;
    if encoded.len() <= MIN_ARTIFACT_BYTES {
        log::debug!(
            "capture generation {generation} too short to keep ({} bytes)",
            encoded.len()
        );
        return Ok(false);
    }

    let bytes = encoded.len() as u64;
    let path = scratch_dir.join(artifact_file_name(unix_millis(), generation));
    std::fs::write(&path, &encoded)?;

    log::info!(
        "capture generation {generation} persisted {bytes} bytes ({duration:.2} s) to {}",
        path.display()
    );

    let event = CaptureEvent::ArtifactReady {
        generation,
        path,
        bytes,
    };
    if events.blocking_send(event).is_err() {
        log::warn!("capture event channel closed, artifact event dropped");
    }
    Ok(true)
}

fn artifact_file_name(millis: u128, generation: u64) -> String {
    format!("recording_{millis}_{generation}.wav")
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Scratch retention
// ---------------------------------------------------------------------------

/// Delete `.wav` files in `dir` older than `max_age`, always sparing the
/// newest one.  Returns how many files were removed.
fn sweep_scratch(dir: &Path, max_age: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let now = SystemTime::now();
    let mut artifacts: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("wav") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        artifacts.push((path, meta.modified().unwrap_or(now)));
    }

    // The newest artifact may still be in flight through the pipeline.
    artifacts.sort_by_key(|(_, modified)| *modified);
    artifacts.pop();

    let mut removed = 0;
    for (path, modified) in artifacts {
        let age = now.duration_since(modified).unwrap_or_default();
        if age >= max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => log::warn!("failed to remove {}: {err}", path.display()),
            }
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Scripted worker for tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::script::CaptureScript;
    use super::*;

    fn state_for(generation: u64) -> SharedState {
        SharedState {
            generation,
            accepting: true,
            buffer: WavBuffer::new(16_000),
            overflowed: false,
        }
    }

    // ---- append_converted --------------------------------------------------

    #[test]
    fn append_accepts_matching_generation() {
        let mut state = state_for(3);
        append_converted(&mut state, 3, &[1, 2, 3], 1_000);
        assert_eq!(state.buffer.len(), 3);
        assert!(state.accepting);
    }

    #[test]
    fn append_drops_stale_generation() {
        let mut state = state_for(3);
        append_converted(&mut state, 2, &[1, 2, 3], 1_000);
        assert!(state.buffer.is_empty());
    }

    #[test]
    fn append_drops_after_stop() {
        let mut state = state_for(1);
        state.accepting = false;
        append_converted(&mut state, 1, &[1, 2, 3], 1_000);
        assert!(state.buffer.is_empty());
    }

    #[test]
    fn append_truncates_at_duration_cap() {
        let mut state = state_for(1);
        append_converted(&mut state, 1, &[7; 10], 6);
        assert_eq!(state.buffer.len(), 6);
        assert!(!state.accepting);
        assert!(state.overflowed);

        // Further chunks are dropped, even for the live generation.
        append_converted(&mut state, 1, &[7; 10], 6);
        assert_eq!(state.buffer.len(), 6);
    }

    /// Two writer threads race with different generations while the session
    /// is restarted under them; only samples from the final generation may
    /// land in the final buffer.
    #[test]
    fn append_is_exclusive_to_live_generation() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let shared = Arc::new(Mutex::new(state_for(1)));
        let done = Arc::new(AtomicBool::new(false));
        let max = 1_000_000;

        let spawn_writer = |generation: u64, marker: i16| {
            let shared = Arc::clone(&shared);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let mut state = shared.lock().unwrap();
                    append_converted(&mut state, generation, &[marker; 16], max);
                    drop(state);
                    thread::yield_now();
                }
            })
        };

        let writer_old = spawn_writer(1, 1);
        let writer_new = spawn_writer(2, 2);

        // Restart mid-flight: bump the generation and reset the buffer.
        thread::sleep(Duration::from_millis(5));
        {
            let mut state = shared.lock().unwrap();
            state.generation = 2;
            state.accepting = true;
            state.buffer = WavBuffer::new(16_000);
            state.overflowed = false;
        }
        thread::sleep(Duration::from_millis(10));
        done.store(true, Ordering::Relaxed);

        writer_old.join().unwrap();
        writer_new.join().unwrap();

        let state = shared.lock().unwrap();
        assert!(!state.buffer.is_empty());
        let encoded = state.buffer.encode().unwrap();
        // Skip the 44-byte header; every payload sample must be the marker
        // of generation 2 (little-endian 0x0002).
        for pair in encoded[44..].chunks_exact(2) {
            assert_eq!(i16::from_le_bytes([pair[0], pair[1]]), 2);
        }
    }

    // ---- persist_artifact --------------------------------------------------

    #[test]
    fn persist_empty_buffer_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = event_mpsc::channel(4);

        let produced =
            persist_artifact(WavBuffer::new(16_000), 1, dir.path(), &tx).unwrap();

        assert!(!produced);
        assert!(rx.try_recv().is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn persist_below_floor_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = event_mpsc::channel(4);

        // 28 samples encode to exactly 100 bytes (44-byte header + 56 bytes
        // of payload), which sits on the floor and must be discarded.
        let mut buffer = WavBuffer::new(16_000);
        buffer.append(&[100; 28]);

        let produced = persist_artifact(buffer, 1, dir.path(), &tx).unwrap();

        assert!(!produced);
        assert!(rx.try_recv().is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn persist_writes_file_and_emits_event() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = event_mpsc::channel(4);

        // 100 ms at 16 kHz
        let mut buffer = WavBuffer::new(16_000);
        buffer.append(&[1_000; 1_600]);

        let produced = persist_artifact(buffer, 7, dir.path(), &tx).unwrap();
        assert!(produced);

        match rx.try_recv().unwrap() {
            CaptureEvent::ArtifactReady {
                generation,
                path,
                bytes,
            } => {
                assert_eq!(generation, 7);
                assert_eq!(bytes, 44 + 1_600 * 2);
                assert_eq!(std::fs::metadata(&path).unwrap().len(), bytes);
                assert!(path
                    .file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .ends_with("_7.wav"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn artifact_file_name_format() {
        assert_eq!(
            artifact_file_name(1_700_000_000_123, 42),
            "recording_1700000000123_42.wav"
        );
    }

    // ---- sweep_scratch -----------------------------------------------------

    #[test]
    fn sweep_keeps_newest_artifact() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["recording_1_1.wav", "recording_2_2.wav", "recording_3_3.wav"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
            thread::sleep(Duration::from_millis(20));
        }

        let removed = sweep_scratch(dir.path(), Duration::ZERO);
        assert_eq!(removed, 2);

        let survivors: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(survivors, vec![std::ffi::OsString::from("recording_3_3.wav")]);
    }

    #[test]
    fn sweep_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), b"x").unwrap();
        std::fs::write(dir.path().join("recording_1_1.wav"), b"x").unwrap();

        let removed = sweep_scratch(dir.path(), Duration::ZERO);

        // The lone wav is the newest artifact, so nothing is deleted.
        assert_eq!(removed, 0);
        assert!(dir.path().join("settings.toml").exists());
        assert!(dir.path().join("recording_1_1.wav").exists());
    }

    // ---- manager plumbing --------------------------------------------------

    #[test]
    fn session_manager_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SessionManager>();
        assert_send::<CaptureEvent>();
    }

    #[tokio::test]
    async fn scripted_round_trip() {
        let mut script = CaptureScript::new();
        let path = PathBuf::from("/tmp/recording_1_1.wav");
        script.stop_produces.push_back(Some((path.clone(), 3_244)));

        let (manager, mut events, calls) = SessionManager::scripted(script);

        let generation = manager.start().await.unwrap();
        assert_eq!(generation, 1);

        let produced = manager.stop().await.unwrap();
        assert!(produced);

        match events.recv().await.unwrap() {
            CaptureEvent::ArtifactReady {
                generation, bytes, ..
            } => {
                assert_eq!(generation, 1);
                assert_eq!(bytes, 3_244);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // A second stop has no scripted artifact and reports no production.
        assert!(!manager.stop().await.unwrap());
        assert_eq!(*calls.lock().unwrap(), ["start", "stop", "stop"]);
    }

    #[tokio::test]
    async fn scripted_start_failure_surfaces() {
        let mut script = CaptureScript::new();
        script.start_fails = true;
        let (manager, _events, _calls) = SessionManager::scripted(script);

        match manager.start().await {
            Err(CaptureError::NoDevice) => {}
            other => panic!("expected NoDevice, got {other:?}"),
        }
    }
}
