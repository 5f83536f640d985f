//! External-process recognizer.
//!
//! Runs a whisper.cpp style command-line recognizer against a WAV artifact
//! and captures the transcript from stdout:
//!
//! ```text
//! <program> -m <model> -f <artifact> --no-timestamps \
//!           --language <lang> --beam-size <n> --best-of <n>
//! ```
//!
//! The invocation is fully blocking, which is fine: the pipeline always
//! calls [`Transcriber::transcribe`] from a blocking task and bounds the
//! wait with its own watchdog.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use log::{debug, info};

use crate::config::SttConfig;
use crate::stt::{SttError, Transcriber};

/// Recognizer that shells out to an external binary per request.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    config: SttConfig,
}

impl CommandTranscriber {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }

    /// Assemble the recognizer invocation for `artifact`.
    fn build_command(&self, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-m")
            .arg(&self.config.model)
            .arg("-f")
            .arg(artifact)
            .arg("--no-timestamps")
            .arg("--language")
            .arg(&self.config.language)
            .arg("--beam-size")
            .arg(self.config.beam_size.to_string())
            .arg("--best-of")
            .arg(self.config.best_of.to_string());
        cmd
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&self, artifact: &Path) -> Result<String, SttError> {
        debug!(
            "running recognizer {:?} on {}",
            self.config.program,
            artifact.display()
        );
        let started = Instant::now();

        let output = self
            .build_command(artifact)
            .output()
            .map_err(|e| SttError::Launch {
                program: self.config.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SttError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(
            "recognizer finished in {:.1}s ({} chars)",
            started.elapsed().as_secs_f32(),
            text.chars().count()
        );
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
