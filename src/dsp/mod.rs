//! Signal conditioning between capture and recognition.
//!
//! [`Conditioner`] applies a fixed sequence of stages to a finalized
//! recording, each independently toggleable through [`DspConfig`]:
//!
//! | # | Stage | Gated by |
//! |---|-------|----------|
//! | 1 | Silence trimming ([`trim_silence`]) | `enable_trimming` |
//! | 2 | Adaptive noise floor ([`adaptive_floor`]) | `enable_noise_suppression` |
//! | 3 | Spectral gating ([`spectral_gate`]) | `enable_noise_suppression` |
//! | 4 | Smooth noise gate ([`smooth_gate`]) | `enable_noise_suppression` |
//! | 5 | Automatic gain ([`auto_gain`]) | `enable_auto_gain` |
//! | 6 | Static boost ([`static_boost`]) | only when auto gain is off |
//! | 7 | Peak normalization ([`normalize_peaks`]) | always |
//!
//! The transform is deterministic and stateless across invocations, and it
//! always produces a [`ConditioningStats`] record even when no stage touched
//! a single sample.  [`Conditioner::condition_file`] rewrites the artifact
//! in place via a temp file and rename, retrying briefly on I/O errors
//! (the file can still be locked right after the capture handle closes).

use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::wav::{self, WavError};
use crate::config::DspConfig;

pub mod gain;
pub mod gate;
pub mod trim;

pub use gain::{auto_gain, normalize_peaks, static_boost};
pub use gate::{adaptive_floor, smooth_gate, spectral_gate};
pub use trim::trim_silence;

/// Rewrite attempts before giving up on a locked artifact.
const REWRITE_ATTEMPTS: u32 = 5;
/// Pause between rewrite attempts.
const REWRITE_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DspError
// ---------------------------------------------------------------------------

/// Errors from conditioning a persisted artifact.
///
/// Transient I/O failures during the rewrite are retried internally and only
/// surface as [`DspError::Rewrite`] once the attempts are exhausted.
#[derive(Debug, Error)]
pub enum DspError {
    #[error("failed to read audio for conditioning: {0}")]
    Read(#[from] WavError),

    #[error("failed to rewrite conditioned audio after {attempts} attempt(s): {source}")]
    Rewrite { attempts: u32, source: WavError },
}

// ---------------------------------------------------------------------------
// ConditioningStats
// ---------------------------------------------------------------------------

/// What one conditioning pass did, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct ConditioningStats {
    pub input_samples: usize,
    pub output_samples: usize,
    /// Milliseconds removed by silence trimming (0 when the stage did not
    /// fire).
    pub trimmed_ms: u64,
    /// Estimated adaptive noise floor, when that stage ran.
    pub noise_floor: Option<f32>,
    /// Spectral frames attenuated.
    pub gated_frames: usize,
    /// Automatic gain applied, when that stage ran and had signal to
    /// measure.
    pub agc_gain: Option<f32>,
    pub peak_before: f32,
    pub peak_after: f32,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Conditioner
// ---------------------------------------------------------------------------

/// Applies the conditioning stages configured in [`DspConfig`].
///
/// # Example
///
/// ```rust
/// use whisperkey::config::DspConfig;
/// use whisperkey::dsp::Conditioner;
///
/// let conditioner = Conditioner::new(DspConfig::default());
/// let mut samples = vec![0.3_f32; 16_000];
/// let stats = conditioner.condition(&mut samples, 16_000);
/// assert_eq!(stats.input_samples, 16_000);
/// ```
#[derive(Debug, Clone)]
pub struct Conditioner {
    config: DspConfig,
}

impl Conditioner {
    pub fn new(config: DspConfig) -> Self {
        Self { config }
    }

    /// Run every enabled stage over `samples` in place.
    pub fn condition(&self, samples: &mut Vec<f32>, sample_rate: u32) -> ConditioningStats {
        let started = Instant::now();
        let input_samples = samples.len();
        let peak_before = gain::peak(samples);

        let mut trimmed_ms = 0u64;
        if self.config.enable_trimming {
            if let Some(keep) = trim::trim_silence(samples, sample_rate) {
                let kept = keep.len();
                let removed = samples.len() - kept;
                trimmed_ms = removed as u64 * 1_000 / u64::from(sample_rate);
                samples.copy_within(keep, 0);
                samples.truncate(kept);
                log::debug!("trimmed {trimmed_ms} ms of silence");
            }
        }

        let mut noise_floor = None;
        let mut gated_frames = 0;
        if self.config.enable_noise_suppression {
            noise_floor = gate::adaptive_floor(samples, sample_rate);
            gated_frames = gate::spectral_gate(samples);
            gate::smooth_gate(samples, self.config.noise_gate_threshold);
        }

        let agc_gain = if self.config.enable_auto_gain {
            gain::auto_gain(samples, self.config.target_rms)
        } else {
            let boost = gain::static_boost(samples);
            log::debug!("static boost {boost:.2} applied");
            None
        };

        gain::normalize_peaks(samples);

        ConditioningStats {
            input_samples,
            output_samples: samples.len(),
            trimmed_ms,
            noise_floor,
            gated_frames,
            agc_gain,
            peak_before,
            peak_after: gain::peak(samples),
            elapsed: started.elapsed(),
        }
    }

    /// Condition the WAV artifact at `path` and rewrite it in place.
    ///
    /// The rewrite goes through a sibling temp file and a rename; transient
    /// I/O failures (the capture layer may not have fully released the file
    /// yet) are retried up to [`REWRITE_ATTEMPTS`] times before surfacing as
    /// [`DspError::Rewrite`].
    pub fn condition_file(&self, path: &Path) -> Result<ConditioningStats, DspError> {
        let (mut samples, sample_rate) = wav::read_samples(path)?;
        let stats = self.condition(&mut samples, sample_rate);
        rewrite_with_retry(path, &samples, sample_rate)?;
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Artifact rewrite
// ---------------------------------------------------------------------------

fn rewrite_with_retry(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), DspError> {
    let tmp = path.with_extension("wav.tmp");

    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match try_rewrite(path, &tmp, samples, sample_rate) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let transient = matches!(err, WavError::Io(_));
        if !transient || attempt >= REWRITE_ATTEMPTS {
            let _ = std::fs::remove_file(&tmp);
            return Err(DspError::Rewrite {
                attempts: attempt,
                source: err,
            });
        }

        log::warn!(
            "conditioned rewrite attempt {attempt}/{REWRITE_ATTEMPTS} failed, retrying: {err}"
        );
        std::thread::sleep(REWRITE_DELAY);
    }
}

fn try_rewrite(
    path: &Path,
    tmp: &Path,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), WavError> {
    wav::write_samples(tmp, samples, sample_rate)?;
    // The original may already be gone if a previous attempt failed between
    // remove and rename; the rename below still completes the swap.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    std::fs::rename(tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
