//! Speech output with two-tier fallback
//!
//! Replies are spoken through the networked voice service when possible,
//! falling back to native synthesis at reduced delivery, and finally to a
//! silent no-op. `speak` always completes exactly once and never errors,
//! so a voice failure can never stall a command cycle.

mod native;
mod voice_service;

pub use native::{EspeakSynthesizer, NativeSynthesizer, SpeechParams, SynthesisError};
pub use voice_service::{AudioPlayer, VoiceOutputError, VoiceService};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

/// Reduced delivery used on the fallback tier
const FALLBACK_PARAMS: SpeechParams = SpeechParams {
    rate: 0.9,
    pitch: 0.8,
    volume: 0.8,
};

/// Turns response text into audible speech
pub struct SpeechOutputAdapter {
    remote: Option<VoiceService>,
    native: Option<Arc<dyn NativeSynthesizer>>,
}

impl SpeechOutputAdapter {
    pub fn new(remote: Option<VoiceService>, native: Option<Arc<dyn NativeSynthesizer>>) -> Self {
        Self { remote, native }
    }

    /// Speak the text, absorbing all failures
    ///
    /// Resolves when playback has finished on some tier, or immediately
    /// once every tier has been exhausted.
    pub async fn speak(&self, text: &str) {
        if let Some(remote) = &self.remote {
            match remote.speak(text).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, "voice service failed, falling back to native synthesis");
                }
            }
        }

        if let Some(native) = &self.native {
            match native.speak(text, FALLBACK_PARAMS).await {
                Ok(()) => return,
                Err(e) => warn!(error = %e, "native synthesis failed"),
            }
        }

        debug!(%text, "no speech output available, continuing silently");
    }
}

/// Locate a program on PATH
pub(crate) fn find_program(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
