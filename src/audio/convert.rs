//! Sample conversion for the capture path.
//!
//! Device callbacks deliver interleaved samples at whatever rate and channel
//! count the hardware prefers.  The session buffer stores 16-bit mono PCM at
//! a fixed target rate, so every chunk passes through:
//!
//! 1. [`downmix_to_mono`]: average interleaved channels down to one.
//! 2. [`resample`]: linear interpolation to the target rate.
//! 3. [`quantize`]: scale, clamp, and convert `f32` to `i16`.
//!
//! All three are pure functions with no allocation tricks; they run on the
//! hardware callback thread before the session lock is taken.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with no
///   averaging (fast path, avoids the per-frame division when already mono).
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use whisperkey::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.0).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz using linear
/// interpolation.
///
/// * If the rates match the input is cloned and returned unchanged.
/// * If `samples` is empty an empty vector is returned.
///
/// The output length is approximately
/// `samples.len() * target_rate / source_rate`.
///
/// # Example
///
/// ```rust
/// use whisperkey::audio::resample;
///
/// // Downsample from 48 kHz to 16 kHz (ratio = 1/3)
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            // Linear interpolation between adjacent samples
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// quantize
// ---------------------------------------------------------------------------

/// Convert `f32` samples in `[-1.0, 1.0]` to 16-bit PCM, applying `scale`
/// first.
///
/// `scale` is the input volume factor (slightly below 1.0 leaves headroom so
/// hot microphones do not clip before conditioning).  Out-of-range results
/// are clamped, never wrapped.
pub fn quantize(samples: &[f32], scale: f32) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = s * scale * i16::MAX as f32;
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
