//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. Clients drive the daemon (toggle capture, submit commands) and
//! read its state; subscribed clients additionally receive engine event
//! pushes.

use serde::{Deserialize, Serialize};

use crate::events::EngineEvent;
use crate::history::HistoryEntry;
use crate::state;

/// Current mode of the interaction engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No capture session, no command in flight
    Idle,
    /// Capture session active
    Listening,
    /// A command is being dispatched and spoken
    Processing,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Idle
    }
}

impl From<state::Mode> for Mode {
    fn from(mode: state::Mode) -> Self {
        match mode {
            state::Mode::Idle => Mode::Idle,
            state::Mode::Listening => Mode::Listening,
            state::Mode::Processing => Mode::Processing,
        }
    }
}

/// Requests from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Toggle the capture session (start when idle, stop when listening)
    ToggleListening,

    /// Submit a command as text, bypassing capture
    SubmitText { text: String },

    /// Request the recent exchange history, newest first
    GetHistory,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to engine event notifications
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Recent exchange history, newest first
    History { entries: Vec<HistoryEntry> },

    /// Control request accepted for processing
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Engine event occurred
    StateEvent(EngineEvent),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current mode
    pub mode: Mode,

    /// Latest transcript (interim or final)
    pub transcript: String,

    /// Response from the most recent completed exchange
    pub last_response: String,

    /// Most recent capture error code, if any
    pub last_error: Option<String>,

    /// Whether speech capture is available on this host
    pub capture_available: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: Mode::default(),
            transcript: String::new(),
            last_response: String::new(),
            last_error: None,
            capture_available: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SubmitText {
            text: "open youtube".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("submit_text"));
        assert!(json.contains("open youtube"));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("idle"));
    }

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::StateEvent(EngineEvent::ListeningStarted);
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("state_event"));
        assert!(json.contains("listening_started"));
    }

    #[test]
    fn test_mode_conversion() {
        assert_eq!(Mode::from(state::Mode::Processing), Mode::Processing);
        assert_eq!(Mode::from(state::Mode::Idle), Mode::Idle);
    }
}
