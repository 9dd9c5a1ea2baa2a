//! Networked voice service tier
//!
//! Fetches synthesized speech from an unauthenticated voice service (text
//! percent-encoded into the URL, fixed voice identifier) and plays the
//! returned audio through an external player process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Bound on a single voice service request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Candidate players, tried in order; each must accept an audio file path
const PLAYERS: &[(&str, &[&str])] = &[
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("mpv", &["--no-video", "--really-quiet"]),
    ("mpg123", &["-q"]),
];

#[derive(Debug, thiserror::Error)]
pub enum VoiceOutputError {
    #[error("voice service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("voice service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("voice service returned no audio")]
    EmptyAudio,

    #[error("no audio player available")]
    PlayerUnavailable,

    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio player exited with {0}")]
    Player(std::process::ExitStatus),
}

/// External audio player process
pub struct AudioPlayer {
    program: PathBuf,
    args: Vec<String>,
}

impl AudioPlayer {
    /// Detect a usable player on PATH, honoring an explicit override
    pub fn detect(override_command: Option<&str>) -> Option<Self> {
        if let Some(command) = override_command {
            return Some(Self::from_command(command));
        }
        PLAYERS.iter().find_map(|(name, args)| {
            super::find_program(name).map(|program| {
                debug!(player = %program.display(), "audio player detected");
                Self {
                    program,
                    args: args.iter().map(ToString::to_string).collect(),
                }
            })
        })
    }

    /// Build a player from a full command line, first word is the program
    pub fn from_command(command: &str) -> Self {
        let mut words = command.split_whitespace();
        let program = PathBuf::from(words.next().unwrap_or("ffplay"));
        Self {
            program,
            args: words.map(ToString::to_string).collect(),
        }
    }

    /// Play the audio file, resolving when playback has finished
    pub async fn play(&self, path: &Path) -> Result<(), VoiceOutputError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            return Err(VoiceOutputError::Player(status));
        }
        Ok(())
    }
}

/// Client for the networked voice service
pub struct VoiceService {
    client: reqwest::Client,
    base_url: String,
    voice: String,
    player: AudioPlayer,
    scratch: PathBuf,
}

impl VoiceService {
    pub fn new(base_url: String, voice: String, player: AudioPlayer, data_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            voice,
            player,
            scratch: data_dir.join("reply.mp3"),
        }
    }

    /// Fetch the synthesized reply and play it to completion
    pub async fn speak(&self, text: &str) -> Result<(), VoiceOutputError> {
        let url = format!(
            "{}?voice={}&text={}",
            self.base_url,
            self.voice,
            urlencoding::encode(text)
        );
        debug!(voice = %self.voice, "requesting voice synthesis");

        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceOutputError::Status(status));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(VoiceOutputError::EmptyAudio);
        }

        tokio::fs::write(&self.scratch, &audio).await?;
        self.player.play(&self.scratch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_override_parsing() {
        let player = AudioPlayer::from_command("mpv --no-video --really-quiet");
        assert_eq!(player.program, PathBuf::from("mpv"));
        assert_eq!(player.args, vec!["--no-video", "--really-quiet"]);
    }

    #[tokio::test]
    async fn test_failing_player_reports_exit_status() {
        let player = AudioPlayer::from_command("false");
        let result = player.play(Path::new("/dev/null")).await;
        assert!(matches!(result, Err(VoiceOutputError::Player(_))));
    }

    #[tokio::test]
    async fn test_succeeding_player_resolves() {
        let player = AudioPlayer::from_command("true");
        player.play(Path::new("/dev/null")).await.unwrap();
    }
}
