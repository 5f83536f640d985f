//! Level management: automatic gain, the static fallback boost, and final
//! peak normalization.

/// Samples at or below this magnitude are excluded from the RMS estimate;
/// including them would bias the measured level down and over-amplify.
const NON_SILENT_FLOOR: f32 = 0.001;

/// The configured target RMS is raised by this factor before clamping.
const TARGET_BOOST: f32 = 1.2;
const TARGET_MIN: f32 = 0.1;
const TARGET_MAX: f32 = 0.9;

/// Allowed automatic gain range.
const GAIN_MIN: f32 = 0.5;
const GAIN_MAX: f32 = 5.0;

/// No sample may exceed this after gain; overshoot from the gain clamp is
/// compressed through the soft knee instead of hard-clipped.
const PEAK_CEILING: f32 = 0.95;
const KNEE_RATIO: f32 = 0.1;

/// Fixed boost applied when automatic gain is disabled.
const STATIC_BOOST: f32 = 1.2;
const BOOST_CEILING: f32 = 0.99;

// ---------------------------------------------------------------------------
// Automatic gain
// ---------------------------------------------------------------------------

/// Scale the buffer toward a target RMS level.
///
/// The RMS is measured over non-silent samples only.  The computed gain is
/// capped so the loudest sample lands at or under [`PEAK_CEILING`], then
/// clamped to `[0.5, 5.0]`; any residual overshoot (possible when the clamp
/// floor wins over the peak cap) is softened by a knee rather than clipped.
///
/// Returns the applied gain, or `None` when the buffer has no non-silent
/// samples to measure.
pub fn auto_gain(samples: &mut [f32], target_rms: f32) -> Option<f32> {
    let mut sum_squares = 0.0_f64;
    let mut max_abs = 0.0_f32;
    let mut non_silent = 0usize;

    for &sample in samples.iter() {
        let abs = sample.abs();
        if abs > NON_SILENT_FLOOR {
            sum_squares += f64::from(sample) * f64::from(sample);
            non_silent += 1;
        }
        if abs > max_abs {
            max_abs = abs;
        }
    }

    if non_silent == 0 {
        return None;
    }
    let rms = (sum_squares / non_silent as f64).sqrt() as f32;
    if rms < 1e-6 {
        return None;
    }

    let target = (target_rms * TARGET_BOOST).clamp(TARGET_MIN, TARGET_MAX);
    let mut gain = target / rms;
    if max_abs > 0.0 {
        gain = gain.min(PEAK_CEILING / max_abs);
    }
    let gain = gain.clamp(GAIN_MIN, GAIN_MAX);

    for sample in samples.iter_mut() {
        *sample *= gain;
        if *sample > PEAK_CEILING {
            *sample = PEAK_CEILING + (*sample - PEAK_CEILING) * KNEE_RATIO;
        } else if *sample < -PEAK_CEILING {
            *sample = -PEAK_CEILING + (*sample + PEAK_CEILING) * KNEE_RATIO;
        }
    }
    Some(gain)
}

// ---------------------------------------------------------------------------
// Static boost
// ---------------------------------------------------------------------------

/// Fixed gain used when automatic gain is disabled.
///
/// The boost is reduced if it would push the loudest sample past
/// [`BOOST_CEILING`].  Returns the boost actually applied.
pub fn static_boost(samples: &mut [f32]) -> f32 {
    let max_abs = peak(samples);

    let mut boost = STATIC_BOOST;
    if max_abs > 0.0 && boost * max_abs > BOOST_CEILING {
        boost = BOOST_CEILING / max_abs;
    }

    for sample in samples.iter_mut() {
        *sample *= boost;
    }
    boost
}

// ---------------------------------------------------------------------------
// Peak normalization
// ---------------------------------------------------------------------------

/// Rescale the whole buffer if any sample exceeds [`PEAK_CEILING`].
///
/// Safety net behind the gain stages; a no-op on already-sane audio.
/// Returns the scale applied (`1.0` when nothing changed).
pub fn normalize_peaks(samples: &mut [f32]) -> f32 {
    let max_peak = peak(samples);
    if max_peak <= PEAK_CEILING {
        return 1.0;
    }

    let scale = PEAK_CEILING / max_peak;
    for sample in samples.iter_mut() {
        *sample *= scale;
    }
    scale
}

/// Largest sample magnitude in the buffer.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
