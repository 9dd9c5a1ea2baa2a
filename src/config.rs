//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Default command interpreter endpoint
const DEFAULT_INTERPRETER_URL: &str = "http://127.0.0.1:8000/api/process-command";

/// Default networked voice service (unauthenticated, text embedded in the URL)
const DEFAULT_VOICE_SERVICE_URL: &str = "https://api.streamelements.com/kappa/v2/speech";

/// Default voice identifier for the voice service
const DEFAULT_VOICE: &str = "Brian";

/// Default recognition locale
const DEFAULT_LOCALE: &str = "en-US";

/// Default dispatch timeout in milliseconds
const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 10_000;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data (socket, temporary audio)
    pub data_dir: PathBuf,

    /// Command interpreter endpoint
    pub interpreter_url: String,

    /// Timeout for a single dispatch to the interpreter
    pub dispatch_timeout: Duration,

    /// Base URL of the networked voice service
    pub voice_service_url: String,

    /// Voice identifier sent to the voice service
    pub voice: String,

    /// Recognition locale passed to the speech recognizer
    pub locale: String,

    /// External recognizer command (speech capture is unavailable when unset)
    pub recognizer_command: Option<String>,

    /// Audio player override (auto-detected when unset)
    pub player_command: Option<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("valet");

        let socket_path = match std::env::var("VALET_SOCKET") {
            Ok(path) => PathBuf::from(path),
            Err(_) => data_dir.join("daemon.sock"),
        };

        let dispatch_timeout_ms = std::env::var("VALET_DISPATCH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DISPATCH_TIMEOUT_MS);

        Ok(Self {
            socket_path,
            data_dir,
            interpreter_url: env_or("VALET_INTERPRETER_URL", DEFAULT_INTERPRETER_URL),
            dispatch_timeout: Duration::from_millis(dispatch_timeout_ms),
            voice_service_url: env_or("VALET_VOICE_URL", DEFAULT_VOICE_SERVICE_URL),
            voice: env_or("VALET_VOICE", DEFAULT_VOICE),
            locale: env_or("VALET_LOCALE", DEFAULT_LOCALE),
            recognizer_command: std::env::var("VALET_RECOGNIZER").ok(),
            player_command: std::env::var("VALET_PLAYER").ok(),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
