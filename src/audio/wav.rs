//! WAV container encode/decode built on the `hound` crate.
//!
//! [`WavBuffer`] accumulates 16-bit mono PCM during capture and encodes the
//! complete container (header + frames) in one step when the session is
//! finalized.  The buffer is append-only while recording; nothing reads the
//! frames until [`WavBuffer::encode`] runs, so a half-written header can never
//! be observed.
//!
//! [`read_samples`] / [`write_samples`] are the file-mode helpers used by the
//! signal conditioner, converting between on-disk 16-bit PCM and the `f32`
//! samples the conditioning stages operate on.

use std::io::Cursor;
use std::path::Path;

use thiserror::Error;

/// Smallest encoded artifact worth processing.  A bare WAV header is 44
/// bytes; anything at or under this floor holds no usable audio.
pub const MIN_ARTIFACT_BYTES: usize = 100;

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or decoding WAV data.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("wav codec error: {0}")]
    Codec(#[from] hound::Error),

    #[error("wav io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// WavBuffer
// ---------------------------------------------------------------------------

/// Append-only PCM accumulator for one capture session.
///
/// Samples are 16-bit signed mono at a fixed rate.  Appending is cheap (a
/// `Vec` extend under the caller's lock); the WAV container is framed only at
/// finalize time.
#[derive(Debug)]
pub struct WavBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl WavBuffer {
    /// Create an empty buffer for `sample_rate` Hz mono audio.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Append a chunk of PCM samples.
    pub fn append(&mut self, pcm: &[i16]) {
        self.samples.extend_from_slice(pcm);
    }

    /// Number of samples accumulated so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when no samples have been appended.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the accumulated audio in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Sample rate this buffer was created with.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encode the accumulated samples as a complete WAV container.
    ///
    /// The buffer itself is left untouched; callers typically `mem::replace`
    /// it with a fresh one before encoding so the capture lock is not held
    /// during encoding.
    pub fn encode(&self) -> Result<Vec<u8>, WavError> {
        encode_wav(&self.samples, self.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Encode mono 16-bit PCM as a WAV container in memory.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Read a WAV file into normalized `f32` samples in `[-1.0, 1.0]`.
///
/// Returns the samples and the file's sample rate.  Multi-channel files are
/// returned interleaved exactly as stored; capture artifacts are always mono.
pub fn read_samples(path: &Path) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
    };

    Ok((samples, spec.sample_rate))
}

/// Write `f32` samples to `path` as a mono 16-bit WAV file.
///
/// Samples are clamped to `[-1.0, 1.0]` before quantization.
pub fn write_samples(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
