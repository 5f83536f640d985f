//! Noise attenuation: adaptive floor, spectral gating, and the smooth
//! per-sample noise gate.
//!
//! All three run only when noise suppression is enabled.  They attenuate
//! rather than erase wherever possible; the one stage that does zero samples
//! (the noise gate) fades through a transition zone instead of cutting hard,
//! so gated speech boundaries do not click.

/// Margin applied to the measured noise floor.
const FLOOR_MARGIN: f32 = 1.5;
/// Attenuation for samples under the adaptive floor.
const FLOOR_ATTENUATION: f32 = 0.1;

/// Spectral gate frame length in samples.
const FRAME_SIZE: usize = 2_048;
/// Mean-square energy below which a frame is considered background.
const FRAME_ENERGY_THRESHOLD: f32 = 0.000_1;
/// Attenuation for gated frames.
const FRAME_ATTENUATION: f32 = 0.05;

/// Bounds for the configured noise gate threshold.
const GATE_THRESHOLD_MIN: f32 = 0.001;
const GATE_THRESHOLD_MAX: f32 = 0.2;

// ---------------------------------------------------------------------------
// Adaptive noise floor
// ---------------------------------------------------------------------------

/// Attenuate samples quieter than an adaptively estimated noise floor.
///
/// The floor is the mean magnitude of the first ~100 ms (push-to-talk
/// recordings almost always open with a beat of silence before speech),
/// scaled by a safety margin.  Samples under the floor are attenuated, not
/// zeroed, so low-energy speech onsets survive.
///
/// Returns the estimated floor, or `None` when the recording is too short
/// to profile.
pub fn adaptive_floor(samples: &mut [f32], sample_rate: u32) -> Option<f32> {
    let profile_len = (sample_rate / 10) as usize; // 100 ms
    if profile_len == 0 || samples.len() < profile_len {
        return None;
    }

    let noise_level: f32 =
        samples[..profile_len].iter().map(|s| s.abs()).sum::<f32>() / profile_len as f32;
    let floor = noise_level * FLOOR_MARGIN;

    for sample in samples.iter_mut() {
        if sample.abs() < floor {
            *sample *= FLOOR_ATTENUATION;
        }
    }
    Some(floor)
}

// ---------------------------------------------------------------------------
// Spectral gating
// ---------------------------------------------------------------------------

/// Strongly attenuate overlapping frames whose energy is below a fixed very
/// low threshold.
///
/// This targets sustained background hum (fans, air conditioning) that the
/// per-sample stages miss because individual hum samples are not uniformly
/// quiet.  Frames overlap by half, and attenuation is applied in place, so
/// consecutive quiet frames compound.  Returns the number of frames gated.
pub fn spectral_gate(samples: &mut [f32]) -> usize {
    let total = samples.len();
    if total < FRAME_SIZE {
        return 0;
    }

    let mut gated = 0;
    let mut i = 0;
    while i < total - FRAME_SIZE {
        let end = (i + FRAME_SIZE).min(total);
        let energy: f32 =
            samples[i..end].iter().map(|s| s * s).sum::<f32>() / FRAME_SIZE as f32;

        if energy < FRAME_ENERGY_THRESHOLD {
            for sample in &mut samples[i..end] {
                *sample *= FRAME_ATTENUATION;
            }
            gated += 1;
        }
        i += FRAME_SIZE / 2;
    }
    gated
}

// ---------------------------------------------------------------------------
// Smooth noise gate
// ---------------------------------------------------------------------------

/// Per-sample noise gate with a linear fade zone.
///
/// The configured `threshold` is clamped to a sane range, and the fade zone
/// spans the lower half of it:
///
/// * `|x| < threshold/2`: zeroed.
/// * `threshold/2 <= |x| < threshold`: scaled by how far into the fade zone
///   the sample sits, ramping from silence up to unity.
/// * `|x| >= threshold`: untouched.
///
/// A hard gate (zero below the threshold, untouched above) produces an
/// audible click wherever the signal crosses the threshold; the fade zone
/// keeps the output continuous in the sample amplitude, so a slow ramp in
/// produces a slow ramp out.
pub fn smooth_gate(samples: &mut [f32], threshold: f32) {
    let threshold = threshold.clamp(GATE_THRESHOLD_MIN, GATE_THRESHOLD_MAX);
    let fade = threshold / 2.0;
    let fade_floor = threshold - fade;

    for sample in samples.iter_mut() {
        let magnitude = sample.abs();
        if magnitude >= threshold {
            continue;
        }
        if magnitude < fade_floor {
            *sample = 0.0;
        } else {
            *sample *= (magnitude - fade_floor) / fade;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
