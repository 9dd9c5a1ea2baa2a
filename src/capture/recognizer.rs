//! Speech recognition backend boundary
//!
//! A backend runs one capture session at a time: a stream of interim
//! results terminated by at most one final result per utterance, or a
//! terminal error. The production backend is an external recognizer
//! process emitting JSON lines on stdout; hosts without one run with
//! capture unavailable.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Events emitted by a recognition backend during a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognizerEvent {
    /// Provisional transcript; may repeat or extend
    Partial { text: String },
    /// Committed transcript; ends the utterance
    Final { text: String },
    /// Terminal recognition error with a backend-defined code
    Error { code: String },
    /// Session ended without a final transcript
    Ended,
}

/// Errors starting or running a capture session
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("speech recognition is unavailable on this host")]
    Unavailable,

    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("failed to start recognizer: {0}")]
    Spawn(String),
}

impl CaptureError {
    /// Stable error code surfaced to clients
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Unavailable => "capture-unavailable",
            CaptureError::AlreadyActive => "capture-busy",
            CaptureError::Spawn(_) => "capture-start-failed",
        }
    }
}

/// Boundary to the host's speech recognition capability
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the recognition capability exists on this host
    fn is_available(&self) -> bool;

    /// Begin a single-utterance capture session feeding `sink`
    ///
    /// The session ends on its own after a final result or a terminal
    /// error; `Ended` is delivered when it ends with neither.
    async fn start(
        &self,
        locale: &str,
        sink: mpsc::Sender<RecognizerEvent>,
    ) -> Result<(), CaptureError>;

    /// Abort the active session, if any
    async fn stop(&self);
}

/// Recognizer that runs an external process per capture session
///
/// The process receives the locale in `VALET_LOCALE` and writes one JSON
/// object per line on stdout, matching [`RecognizerEvent`]. Killing the
/// process aborts the session; process exit without a final result is
/// reported as `Ended`.
pub struct CommandRecognizer {
    command: String,
    child: Arc<Mutex<Option<Child>>>,
}

impl CommandRecognizer {
    pub fn new(command: String) -> Self {
        Self {
            command,
            child: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn start(
        &self,
        locale: &str,
        sink: mpsc::Sender<RecognizerEvent>,
    ) -> Result<(), CaptureError> {
        let mut slot = self.child.lock().await;
        if slot.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("VALET_LOCALE", locale)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Spawn("recognizer stdout unavailable".to_string()))?;

        debug!(command = %self.command, "recognizer session started");
        *slot = Some(child);
        drop(slot);

        let slot = Arc::clone(&self.child);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut terminal = false;

            while let Ok(Some(line)) = lines.next_line().await {
                let event: RecognizerEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(%line, ?e, "discarding unparseable recognizer line");
                        continue;
                    }
                };

                let is_terminal = matches!(
                    event,
                    RecognizerEvent::Final { .. } | RecognizerEvent::Error { .. }
                );
                if sink.send(event).await.is_err() {
                    break;
                }
                if is_terminal {
                    terminal = true;
                    break;
                }
            }

            if !terminal {
                let _ = sink.send(RecognizerEvent::Ended).await;
            }

            // Single-utterance mode: the session is over either way
            if let Some(mut child) = slot.lock().await.take() {
                let _ = child.kill().await;
            }
            debug!("recognizer session ended");
        });

        Ok(())
    }

    async fn stop(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            // The reader sees EOF and reports Ended
            let _ = child.kill().await;
        }
    }
}

/// Placeholder backend for hosts without a recognizer configured
pub struct NullRecognizer;

#[async_trait]
impl SpeechRecognizer for NullRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    async fn start(
        &self,
        _locale: &str,
        _sink: mpsc::Sender<RecognizerEvent>,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable)
    }

    async fn stop(&self) {}
}
