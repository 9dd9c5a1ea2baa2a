//! Native speech synthesis boundary
//!
//! The production backend shells out to espeak-ng (or espeak) when one is
//! installed. Parameters scale against the engine's own defaults.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Delivery parameters, as multipliers of the engine defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("failed to run synthesizer: {0}")]
    Io(#[from] std::io::Error),

    #[error("synthesizer exited with {0}")]
    Failed(std::process::ExitStatus),
}

/// Boundary to the host's speech synthesis capability
#[async_trait]
pub trait NativeSynthesizer: Send + Sync {
    /// Speak the text, resolving when playback has finished
    async fn speak(&self, text: &str, params: SpeechParams) -> Result<(), SynthesisError>;
}

// espeak-ng defaults that the multipliers scale against
const BASE_RATE_WPM: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;
const BASE_VOLUME: f32 = 100.0;

/// Scale the multipliers to espeak-ng's -s/-p/-a settings
fn espeak_settings(params: SpeechParams) -> (i32, i32, i32) {
    (
        (BASE_RATE_WPM * params.rate).round() as i32,
        (BASE_PITCH * params.pitch).round() as i32,
        (BASE_VOLUME * params.volume).round() as i32,
    )
}

/// Synthesizer backed by the espeak-ng command line engine
pub struct EspeakSynthesizer {
    program: PathBuf,
}

impl EspeakSynthesizer {
    /// Find espeak-ng (or espeak) on PATH
    pub fn detect() -> Option<Self> {
        let program =
            super::find_program("espeak-ng").or_else(|| super::find_program("espeak"))?;
        debug!(program = %program.display(), "native synthesizer detected");
        Some(Self { program })
    }
}

#[async_trait]
impl NativeSynthesizer for EspeakSynthesizer {
    async fn speak(&self, text: &str, params: SpeechParams) -> Result<(), SynthesisError> {
        let (rate, pitch, volume) = espeak_settings(params);

        let status = Command::new(&self.program)
            .arg("-s")
            .arg(rate.to_string())
            .arg("-p")
            .arg(pitch.to_string())
            .arg("-a")
            .arg(volume.to_string())
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            return Err(SynthesisError::Failed(status));
        }
        Ok(())
    }
}
