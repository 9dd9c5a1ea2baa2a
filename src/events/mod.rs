//! Engine event notifications
//!
//! Structured events emitted by the interaction engine during a command
//! cycle, broadcast to subscribed IPC clients.

use serde::{Deserialize, Serialize};

/// Events emitted by the interaction engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A capture session started and the engine is listening
    ListeningStarted,

    /// The transcript changed (interim or final)
    TranscriptUpdated {
        transcript: String,
        is_final: bool,
    },

    /// The capture session ended without producing a command
    ListeningStopped,

    /// A finalized command entered processing
    ProcessingStarted {
        command: String,
    },

    /// The interpreter's reply (or the apology substitute) is available
    ResponseDelivered {
        command: String,
        response: String,
    },

    /// Speech capture failed with a recognizer error code
    CaptureFailed {
        code: String,
    },

    /// A command cycle finished and the engine is idle again
    CycleFinished {
        /// Duration in milliseconds from dispatch to history append
        duration_ms: u64,
    },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::ListeningStarted => write!(f, "LISTENING_STARTED"),
            EngineEvent::TranscriptUpdated { transcript, is_final } => {
                let kind = if *is_final { "final" } else { "interim" };
                write!(f, "TRANSCRIPT_UPDATED ({kind}: {transcript:?})")
            }
            EngineEvent::ListeningStopped => write!(f, "LISTENING_STOPPED"),
            EngineEvent::ProcessingStarted { command } => {
                write!(f, "PROCESSING_STARTED ({command:?})")
            }
            EngineEvent::ResponseDelivered { command, .. } => {
                write!(f, "RESPONSE_DELIVERED ({command:?})")
            }
            EngineEvent::CaptureFailed { code } => write!(f, "CAPTURE_FAILED ({code})"),
            EngineEvent::CycleFinished { duration_ms } => {
                write!(f, "CYCLE_FINISHED ({duration_ms}ms)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::ResponseDelivered {
            command: "open youtube".to_string(),
            response: "Opening YouTube for you, sir.".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("response_delivered"));
        assert!(json.contains("open youtube"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"capture_failed","code":"no-speech"}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, EngineEvent::CaptureFailed { code } if code == "no-speech"));
    }
}
