//! Energy-based silence trimming.
//!
//! Scans ~20 ms windows from both ends of a recording and locates the first
//! and last window whose mean-square energy exceeds a fixed threshold.  The
//! kept range backs up one window before speech onset and extends two
//! windows past the last speech so plosives and trailing consonants are not
//! clipped.  Trimming is only worthwhile when it removes a meaningful amount
//! of audio, so anything under ~100 ms of total trim is left alone.

use std::ops::Range;

/// Mean-square energy above which a window counts as speech.
const SILENCE_ENERGY_THRESHOLD: f32 = 0.01;

// ---------------------------------------------------------------------------
// trim_silence
// ---------------------------------------------------------------------------

/// Locate the speech portion of `samples`.
///
/// Returns `Some(range)` of the samples to keep when trimming would remove
/// more than 100 ms, `None` when the recording should be left untouched
/// (clean audio, all-silence audio, or a buffer shorter than one window).
///
/// # Example
///
/// ```rust
/// use whisperkey::dsp::trim_silence;
///
/// // Half a second of silence, then a loud tone.
/// let mut samples = vec![0.0_f32; 8_000];
/// samples.extend(vec![0.5_f32; 8_000]);
///
/// let range = trim_silence(&samples, 16_000).unwrap();
/// assert!(range.start > 6_000);
/// assert_eq!(range.end, samples.len());
/// ```
pub fn trim_silence(samples: &[f32], sample_rate: u32) -> Option<Range<usize>> {
    let total = samples.len();
    let window = (sample_rate / 50) as usize; // 20 ms
    if window == 0 || total <= window {
        return None;
    }
    let step = (window / 2).max(1);

    // Scan forward for speech onset, then back up one window so the first
    // phoneme is not clipped.
    let mut speech_start = 0usize;
    let mut i = 0usize;
    while i < total - window {
        if window_energy(samples, i, window) > SILENCE_ENERGY_THRESHOLD {
            speech_start = i.saturating_sub(window);
            break;
        }
        i += step;
    }

    // Scan backward for the last speech window, then pad two windows so the
    // tail of the final word survives.
    let mut speech_end = total - 1;
    let mut j = (total - window) as i64;
    while j >= speech_start as i64 {
        let idx = j as usize;
        if window_energy(samples, idx, window) > SILENCE_ENERGY_THRESHOLD {
            speech_end = (idx + window * 2).min(total - 1);
            break;
        }
        j -= step as i64;
    }

    let trimmed = speech_start + (total - 1 - speech_end);
    if trimmed > (sample_rate / 10) as usize {
        Some(speech_start..speech_end + 1)
    } else {
        None
    }
}

fn window_energy(samples: &[f32], start: usize, window: usize) -> f32 {
    let end = (start + window).min(samples.len());
    let sum: f32 = samples[start..end].iter().map(|s| s * s).sum();
    sum / window as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
