//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and artifact retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz for the captured artifact (recognizers expect
    /// 16 000).
    pub sample_rate: u32,
    /// Maximum recording length in seconds; once the buffer holds this much
    /// audio the session stops accepting further samples.
    pub max_recording_secs: f32,
    /// Input device name; `None` means the system default.
    pub device: Option<String>,
    /// Minutes a capture artifact may sit in the scratch directory before the
    /// periodic sweep deletes it.
    pub retention_minutes: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_recording_secs: 300.0,
            device: None,
            retention_minutes: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// DspConfig
// ---------------------------------------------------------------------------

/// Settings for the signal-conditioning stages applied before recognition.
///
/// Stage order is fixed (trim → noise floor → spectral gate → noise gate →
/// gain → peak normalization); these flags only toggle individual stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DspConfig {
    /// Trim leading/trailing silence using energy-based voice-activity
    /// detection.
    pub enable_trimming: bool,
    /// Apply the noise-suppression stages (adaptive floor, spectral gate,
    /// noise gate).
    pub enable_noise_suppression: bool,
    /// Apply automatic gain toward `target_rms`.  When disabled a fixed
    /// static boost is applied instead.
    pub enable_auto_gain: bool,
    /// RMS level the automatic gain steers toward (0.0 – 1.0).
    pub target_rms: f32,
    /// Noise-gate threshold (0.0 – 1.0); samples below it are faded out.
    pub noise_gate_threshold: f32,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            enable_trimming: true,
            enable_noise_suppression: false,
            enable_auto_gain: false,
            target_rms: 0.2,
            noise_gate_threshold: 0.02,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Settings for the pipeline coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds the watchdog allows a transcription to run before it is
    /// force-failed.  The recognizer call itself cannot be cancelled; this is
    /// the only bound on a stuck engine.
    pub watchdog_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { watchdog_secs: 60 }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the external speech-recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Recognizer executable name or path (e.g. `"whisper"`).
    pub program: String,
    /// Model file name or path passed to the recognizer via `-m`.
    pub model: String,
    /// Speech language as an ISO-639-1 code, or `"auto"` for engine-side
    /// detection.
    pub language: String,
    /// Beam width for decoding (1 – 10; larger is slower and more accurate).
    pub beam_size: u32,
    /// Number of candidates sampled per position (1 – 10).
    pub best_of: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            program: "whisper".into(),
            model: "ggml-small.bin".into(),
            language: "en".into(),
            beam_size: 5,
            best_of: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// InjectConfig
// ---------------------------------------------------------------------------

/// Settings for routing recognized text to the active application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectConfig {
    /// Simulate the paste shortcut after setting the clipboard.  When `false`
    /// the text is only copied and the user pastes manually.
    pub auto_paste: bool,
    /// Milliseconds to wait after setting the clipboard before simulating
    /// paste.
    pub paste_delay_ms: u64,
    /// Milliseconds to wait after simulating paste before restoring the
    /// original clipboard.
    pub restore_delay_ms: u64,
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            auto_paste: true,
            paste_delay_ms: 50,
            restore_delay_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use whisperkey::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Microphone capture settings.
    pub audio: AudioConfig,
    /// Signal-conditioning settings.
    pub dsp: DspConfig,
    /// Pipeline coordinator settings.
    pub pipeline: PipelineConfig,
    /// Speech-recognition engine settings.
    pub stt: SttConfig,
    /// Text-injection settings.
    pub inject: InjectConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            dsp: DspConfig::default(),
            pipeline: PipelineConfig::default(),
            stt: SttConfig::default(),
            inject: InjectConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // AudioConfig
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(
            original.audio.max_recording_secs,
            loaded.audio.max_recording_secs
        );
        assert_eq!(original.audio.device, loaded.audio.device);
        assert_eq!(
            original.audio.retention_minutes,
            loaded.audio.retention_minutes
        );

        // DspConfig
        assert_eq!(original.dsp.enable_trimming, loaded.dsp.enable_trimming);
        assert_eq!(
            original.dsp.enable_noise_suppression,
            loaded.dsp.enable_noise_suppression
        );
        assert_eq!(original.dsp.enable_auto_gain, loaded.dsp.enable_auto_gain);
        assert_eq!(original.dsp.target_rms, loaded.dsp.target_rms);
        assert_eq!(
            original.dsp.noise_gate_threshold,
            loaded.dsp.noise_gate_threshold
        );

        // PipelineConfig
        assert_eq!(original.pipeline.watchdog_secs, loaded.pipeline.watchdog_secs);

        // SttConfig
        assert_eq!(original.stt.program, loaded.stt.program);
        assert_eq!(original.stt.model, loaded.stt.model);
        assert_eq!(original.stt.language, loaded.stt.language);
        assert_eq!(original.stt.beam_size, loaded.stt.beam_size);
        assert_eq!(original.stt.best_of, loaded.stt.best_of);

        // InjectConfig
        assert_eq!(original.inject.auto_paste, loaded.inject.auto_paste);
        assert_eq!(original.inject.paste_delay_ms, loaded.inject.paste_delay_ms);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
        assert_eq!(config.dsp.target_rms, default.dsp.target_rms);
        assert_eq!(config.pipeline.watchdog_secs, default.pipeline.watchdog_secs);
        assert_eq!(config.stt.model, default.stt.model);
        assert_eq!(config.inject.auto_paste, default.inject.auto_paste);
    }

    /// Verify default values match the documented behaviour.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.audio.max_recording_secs, 300.0);
        assert_eq!(cfg.audio.retention_minutes, 30);
        assert!(cfg.audio.device.is_none());

        assert!(cfg.dsp.enable_trimming);
        assert!(!cfg.dsp.enable_noise_suppression);
        assert!(!cfg.dsp.enable_auto_gain);
        assert_eq!(cfg.dsp.target_rms, 0.2);
        assert_eq!(cfg.dsp.noise_gate_threshold, 0.02);

        assert_eq!(cfg.pipeline.watchdog_secs, 60);

        assert_eq!(cfg.stt.program, "whisper");
        assert_eq!(cfg.stt.model, "ggml-small.bin");
        assert_eq!(cfg.stt.language, "en");
        assert_eq!(cfg.stt.beam_size, 5);
        assert_eq!(cfg.stt.best_of, 5);

        assert!(cfg.inject.auto_paste);
        assert_eq!(cfg.inject.paste_delay_ms, 50);
        assert_eq!(cfg.inject.restore_delay_ms, 100);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.max_recording_secs = 120.0;
        cfg.audio.device = Some("USB Microphone".into());
        cfg.dsp.enable_noise_suppression = true;
        cfg.dsp.enable_auto_gain = true;
        cfg.dsp.target_rms = 0.3;
        cfg.pipeline.watchdog_secs = 90;
        cfg.stt.language = "de".into();
        cfg.stt.beam_size = 1;
        cfg.inject.auto_paste = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.max_recording_secs, 120.0);
        assert_eq!(loaded.audio.device.as_deref(), Some("USB Microphone"));
        assert!(loaded.dsp.enable_noise_suppression);
        assert!(loaded.dsp.enable_auto_gain);
        assert_eq!(loaded.dsp.target_rms, 0.3);
        assert_eq!(loaded.pipeline.watchdog_secs, 90);
        assert_eq!(loaded.stt.language, "de");
        assert_eq!(loaded.stt.beam_size, 1);
        assert!(!loaded.inject.auto_paste);
    }
}
