//! Audio capture: device discovery, the capture session worker, sample
//! conversion, and WAV artifact encoding.
//!
//! The flow for one recording:
//!
//! ```text
//! cpal callback (f32, native rate, interleaved)
//!   └─▶ downmix_to_mono ─▶ resample ─▶ quantize (i16 @ 16 kHz)
//!        └─▶ WavBuffer (guarded by the session mutex)
//!             └─▶ stop: encode ─▶ scratch file ─▶ CaptureEvent::ArtifactReady
//! ```
//!
//! [`SessionManager`] is the only type most callers need; the conversion
//! helpers are exposed for the conditioning stage and for tests.

pub mod convert;
pub mod device;
pub mod session;
pub mod wav;

pub use convert::{downmix_to_mono, quantize, resample};
pub use device::{input_device_names, CaptureError};
pub use session::{CaptureEvent, SessionManager};
pub use wav::{read_samples, write_samples, WavBuffer, WavError, MIN_ARTIFACT_BYTES};
