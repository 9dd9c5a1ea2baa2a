//! Capture session adapter
//!
//! Bridges a recognition backend to the interaction engine: owns session
//! activity, forwards transcript events as engine inputs, and enforces
//! single-utterance capture. Start failures are reported through the
//! engine's error path rather than returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::state::Input;

use super::recognizer::{CaptureError, RecognizerEvent, SpeechRecognizer};

pub struct SpeechCaptureAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    locale: String,
    input_tx: mpsc::Sender<Input>,
    active: Arc<AtomicBool>,
}

impl SpeechCaptureAdapter {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        locale: String,
        input_tx: mpsc::Sender<Input>,
    ) -> Self {
        Self {
            recognizer,
            locale,
            input_tx,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the recognition capability exists on this host
    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Whether a capture session is currently active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Begin a capture session
    ///
    /// Failures surface as `Input::CaptureFailed`; an unavailable backend
    /// reports the same code on every attempt.
    pub async fn start(&self) {
        if !self.recognizer.is_available() {
            self.report_failure(CaptureError::Unavailable.code()).await;
            return;
        }
        if self.active.swap(true, Ordering::SeqCst) {
            debug!("capture session already active");
            return;
        }

        let (event_tx, mut event_rx) = mpsc::channel(32);
        if let Err(e) = self.recognizer.start(&self.locale, event_tx).await {
            self.active.store(false, Ordering::SeqCst);
            self.report_failure(e.code()).await;
            return;
        }

        let _ = self.input_tx.send(Input::CaptureStarted).await;

        let input_tx = self.input_tx.clone();
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let input = match event {
                    RecognizerEvent::Partial { text } => Input::TranscriptPartial(text),
                    RecognizerEvent::Final { text } => {
                        active.store(false, Ordering::SeqCst);
                        Input::TranscriptFinal(text)
                    }
                    RecognizerEvent::Error { code } => {
                        active.store(false, Ordering::SeqCst);
                        Input::CaptureFailed { code }
                    }
                    RecognizerEvent::Ended => {
                        active.store(false, Ordering::SeqCst);
                        Input::CaptureStopped
                    }
                };
                if input_tx.send(input).await.is_err() {
                    break;
                }
            }
            active.store(false, Ordering::SeqCst);
        });
    }

    /// Abort the active capture session; the session-end event flows back
    /// through the recognizer's event stream
    pub async fn stop(&self) {
        self.recognizer.stop().await;
    }

    async fn report_failure(&self, code: &str) {
        let _ = self
            .input_tx
            .send(Input::CaptureFailed {
                code: code.to_string(),
            })
            .await;
    }
}
