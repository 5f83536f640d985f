//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\whisperkey\
//!   macOS:   ~/Library/Application Support/whisperkey/
//!   Linux:   ~/.config/whisperkey/
//!
//! Cache dir (capture scratch space):
//!   Windows: %LOCALAPPDATA%\whisperkey\
//!   macOS:   ~/Library/Caches/whisperkey/
//!   Linux:   ~/.cache/whisperkey/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Scratch directory where capture artifacts (`recording_*.wav`) live
    /// between finalization and cleanup.
    pub scratch_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "whisperkey";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let scratch_dir = cache_dir.join("audio");

        Self {
            config_dir,
            settings_file,
            scratch_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
