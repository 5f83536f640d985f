//! Input device discovery and stream construction via `cpal`.
//!
//! This module owns the host/device/format plumbing that the capture session
//! sits on top of: picking an input device (by configured name or system
//! default), querying its preferred configuration, and building an input
//! stream that always hands the callback `f32` samples regardless of the
//! hardware's native sample format.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised by the capture subsystem.
///
/// Device and stream variants originate here; the encode, persist, and
/// worker variants are raised by the session manager when finalizing a
/// recording fails or the capture worker thread has exited.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported input sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to encode recording: {0}")]
    Encode(#[from] crate::audio::wav::WavError),

    #[error("failed to persist recording: {0}")]
    Persist(#[from] std::io::Error),

    #[error("capture worker is not running")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// InputDevice
// ---------------------------------------------------------------------------

/// An opened input device together with its preferred stream configuration.
pub(crate) struct InputDevice {
    pub device: cpal::Device,
    pub config: cpal::StreamConfig,
    pub sample_format: cpal::SampleFormat,
    /// Native sample rate reported by the device (Hz).
    pub sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    pub channels: u16,
    /// Human-readable device name for logging.
    pub name: String,
}

/// Open the input device named `preferred`, or the system default when no
/// name is configured or the named device is not present.
///
/// Queries the device's preferred stream configuration (sample rate,
/// channels, sample format) so no manual configuration is required.
///
/// # Errors
///
/// Returns [`CaptureError::NoDevice`] when no input device is available, or
/// [`CaptureError::DefaultConfig`] when the device cannot report a default
/// stream configuration.
pub(crate) fn open_input(preferred: Option<&str>) -> Result<InputDevice, CaptureError> {
    let host = cpal::default_host();

    let device = match preferred {
        Some(wanted) => match find_by_name(&host, wanted) {
            Some(dev) => dev,
            None => {
                log::warn!("input device {wanted:?} not found, falling back to default");
                host.default_input_device().ok_or(CaptureError::NoDevice)?
            }
        },
        None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
    };

    let supported = device.default_input_config()?;

    let sample_format = supported.sample_format();
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    Ok(InputDevice {
        device,
        config,
        sample_format,
        sample_rate,
        channels,
        name,
    })
}

fn find_by_name(host: &cpal::Host, wanted: &str) -> Option<cpal::Device> {
    let devices = host.input_devices().ok()?;
    for device in devices {
        if let Ok(name) = device.name() {
            if name == wanted {
                return Some(device);
            }
        }
    }
    None
}

/// Names of every input device on the default host.
///
/// Enumeration failures are logged and yield an empty list rather than an
/// error so callers can always show something.
pub fn input_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(err) => {
            log::warn!("failed to enumerate input devices: {err}");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Stream construction
// ---------------------------------------------------------------------------

/// Build and start an input stream on `input`, delivering every hardware
/// buffer to `on_chunk` as interleaved `f32` samples.
///
/// The stream is format-dispatched: `i16` and `u16` devices are converted
/// sample-by-sample on the audio thread so downstream code only ever sees
/// `f32` in `[-1.0, 1.0]`.  `on_error` receives asynchronous stream errors
/// (device unplugged, ring buffer overrun) on the same audio thread.
///
/// # Errors
///
/// Returns [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`] if
/// the platform rejects the stream configuration, and
/// [`CaptureError::UnsupportedFormat`] for sample formats outside
/// `f32`/`i16`/`u16`.
pub(crate) fn build_input_stream(
    input: &InputDevice,
    on_chunk: impl FnMut(Vec<f32>) + Send + 'static,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError> {
    let stream = match input.sample_format {
        cpal::SampleFormat::F32 => build_typed::<f32>(input, on_chunk, on_error)?,
        cpal::SampleFormat::I16 => build_typed::<i16>(input, on_chunk, on_error)?,
        cpal::SampleFormat::U16 => build_typed::<u16>(input, on_chunk, on_error)?,
        format => return Err(CaptureError::UnsupportedFormat(format)),
    };

    stream.play()?;
    Ok(stream)
}

fn build_typed<T>(
    input: &InputDevice,
    mut on_chunk: impl FnMut(Vec<f32>) + Send + 'static,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let stream = input.device.build_input_stream(
        &input.config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
            on_chunk(samples);
        },
        on_error,
        None, // no timeout
    )?;

    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
