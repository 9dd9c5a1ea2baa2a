//! Interaction engine: the async driver around the state machine
//!
//! Consumes inputs from capture, IPC, and the in-flight command cycle
//! through one channel, applies them via the transition function, and
//! carries out the returned actions. The command cycle (dispatch, the
//! navigation side effect, speech output, history append) runs as a
//! future raced against the input stream, so control events arriving
//! mid-cycle are observed and dropped rather than queued.

mod opener;

pub use opener::{LinkOpener, SystemOpener};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::capture::SpeechCaptureAdapter;
use crate::dispatch::{CommandAction, CommandDispatcher};
use crate::events::EngineEvent;
use crate::history::{HistoryEntry, HistoryStore};
use crate::speech::SpeechOutputAdapter;
use crate::state::{transition, Action, Input, InteractionState, Mode};

/// Spoken in place of a reply when dispatch fails; dispatch is never retried
pub const APOLOGY_RESPONSE: &str =
    "I apologize sir, I am having trouble reaching my command systems right now.";

type CycleFuture = Pin<Box<dyn Future<Output = Input> + Send>>;

/// Resolve the in-flight cycle, clearing the slot; pends forever when idle
///
/// Safe to race against the input stream: dropping this future leaves the
/// cycle itself owned by the caller and resumable on the next iteration.
async fn await_cycle(cycle: &mut Option<CycleFuture>) -> Input {
    let finished = match cycle.as_mut() {
        Some(in_flight) => in_flight.await,
        None => std::future::pending().await,
    };
    *cycle = None;
    finished
}

/// The interaction engine
pub struct InteractionEngine {
    state: InteractionState,
    capture: Arc<SpeechCaptureAdapter>,
    dispatcher: Arc<dyn CommandDispatcher>,
    speech: Arc<SpeechOutputAdapter>,
    opener: Arc<dyn LinkOpener>,
    history: Arc<RwLock<HistoryStore>>,
    input_tx: mpsc::Sender<Input>,
    event_tx: broadcast::Sender<EngineEvent>,
    cycle_started_at: Option<Instant>,
}

impl InteractionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: Arc<SpeechCaptureAdapter>,
        dispatcher: Arc<dyn CommandDispatcher>,
        speech: Arc<SpeechOutputAdapter>,
        opener: Arc<dyn LinkOpener>,
        history: Arc<RwLock<HistoryStore>>,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            state: InteractionState::new(),
            capture,
            dispatcher,
            speech,
            opener,
            history,
            input_tx,
            event_tx,
            cycle_started_at: None,
        }
    }

    /// Run the engine until the input channel closes
    ///
    /// Dropping the returned future aborts any in-flight command cycle.
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<Input>) {
        info!("interaction engine started in Idle mode");

        let mut cycle: Option<CycleFuture> = None;

        loop {
            let input = tokio::select! {
                received = input_rx.recv() => match received {
                    Some(input) => input,
                    None => break,
                },
                finished = await_cycle(&mut cycle) => finished,
            };

            if let Some(event) = self.event_for(&input) {
                let _ = self.event_tx.send(event);
            }

            let Some(action) = transition(&mut self.state, input) else {
                continue;
            };

            match action {
                Action::StartCapture => self.capture.start().await,
                Action::StopCapture => self.capture.stop().await,
                Action::BeginCycle { command } => {
                    self.cycle_started_at = Some(Instant::now());
                    let _ = self.event_tx.send(EngineEvent::ProcessingStarted {
                        command: command.clone(),
                    });
                    cycle = Some(Box::pin(command_cycle(
                        command,
                        Arc::clone(&self.dispatcher),
                        Arc::clone(&self.speech),
                        Arc::clone(&self.opener),
                        self.input_tx.clone(),
                        self.event_tx.clone(),
                    )));
                }
                Action::RecordExchange { command, response } => {
                    self.record_exchange(command, response).await;
                }
            }
        }

        info!("interaction engine stopped");
    }

    /// Notification to broadcast for an input, given the pre-transition mode
    fn event_for(&self, input: &Input) -> Option<EngineEvent> {
        match (self.state.mode, input) {
            (Mode::Idle, Input::CaptureStarted) => Some(EngineEvent::ListeningStarted),
            (Mode::Listening, Input::TranscriptPartial(text)) => {
                Some(EngineEvent::TranscriptUpdated {
                    transcript: text.clone(),
                    is_final: false,
                })
            }
            (Mode::Listening, Input::TranscriptFinal(text)) => {
                Some(EngineEvent::TranscriptUpdated {
                    transcript: text.clone(),
                    is_final: true,
                })
            }
            (Mode::Listening, Input::CaptureStopped) => Some(EngineEvent::ListeningStopped),
            (Mode::Idle | Mode::Listening, Input::CaptureFailed { code }) => {
                Some(EngineEvent::CaptureFailed { code: code.clone() })
            }
            _ => None,
        }
    }

    async fn record_exchange(&mut self, command: String, response: String) {
        let duration_ms = self
            .cycle_started_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        self.history.write().await.record(HistoryEntry {
            command,
            response,
            occurred_at: Utc::now(),
        });

        debug!(duration_ms, "command cycle recorded");
        let _ = self.event_tx.send(EngineEvent::CycleFinished { duration_ms });
    }
}

/// One command cycle: dispatch, navigation side effect, speech, handoff
///
/// Resolves to the `CycleFinished` input once the response has been spoken
/// (or speech was abandoned); the engine then appends history and returns
/// to Idle. Runs strictly once per finalized command.
async fn command_cycle(
    command: String,
    dispatcher: Arc<dyn CommandDispatcher>,
    speech: Arc<SpeechOutputAdapter>,
    opener: Arc<dyn LinkOpener>,
    input_tx: mpsc::Sender<Input>,
    event_tx: broadcast::Sender<EngineEvent>,
) -> Input {
    let (response, action) = match dispatcher.dispatch(&command, Utc::now()).await {
        Ok(result) => (result.response_text, result.action),
        Err(e) => {
            warn!(error = %e, "dispatch failed, substituting apology");
            (APOLOGY_RESPONSE.to_string(), None)
        }
    };

    let _ = event_tx.send(EngineEvent::ResponseDelivered {
        command: command.clone(),
        response: response.clone(),
    });
    let _ = input_tx
        .send(Input::DispatchCompleted {
            response: response.clone(),
        })
        .await;

    if let Some(CommandAction::OpenUrl { url }) = action {
        if let Err(e) = opener.open(&url).await {
            warn!(%url, error = %e, "failed to open navigation target");
        }
    }

    speech.speak(&response).await;

    Input::CycleFinished { command, response }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::capture::NullRecognizer;
    use crate::dispatch::{CommandResult, RemoteError};
    use crate::speech::{NativeSynthesizer, SpeechParams, SynthesisError};

    struct ScriptedDispatcher {
        reply: Result<(String, Option<CommandAction>), ()>,
        delay: Duration,
        dispatched: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CommandDispatcher for ScriptedDispatcher {
        async fn dispatch(
            &self,
            command: &str,
            _timestamp: DateTime<Utc>,
        ) -> Result<CommandResult, RemoteError> {
            self.dispatched.lock().unwrap().push(command.to_string());
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok((response, action)) => Ok(CommandResult {
                    response_text: response.clone(),
                    action: action.clone(),
                }),
                Err(()) => Err(RemoteError::Status(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                )),
            }
        }
    }

    struct RecordingSynthesizer {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NativeSynthesizer for RecordingSynthesizer {
        async fn speak(&self, text: &str, _params: SpeechParams) -> Result<(), SynthesisError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct RecordingOpener {
        opened: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LinkOpener for RecordingOpener {
        async fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct Harness {
        input_tx: mpsc::Sender<Input>,
        event_rx: broadcast::Receiver<EngineEvent>,
        history: Arc<RwLock<HistoryStore>>,
        dispatched: Arc<Mutex<Vec<String>>>,
        opened: Arc<Mutex<Vec<String>>>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    fn spawn_engine(
        reply: Result<(String, Option<CommandAction>), ()>,
        delay: Duration,
    ) -> Harness {
        let (input_tx, input_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = broadcast::channel(64);

        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Mutex::new(Vec::new()));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let history = Arc::new(RwLock::new(HistoryStore::new()));

        let capture = Arc::new(SpeechCaptureAdapter::new(
            Arc::new(NullRecognizer),
            "en-US".to_string(),
            input_tx.clone(),
        ));
        let speech = Arc::new(SpeechOutputAdapter::new(
            None,
            Some(Arc::new(RecordingSynthesizer {
                spoken: Arc::clone(&spoken),
            })),
        ));

        let mut engine = InteractionEngine::new(
            capture,
            Arc::new(ScriptedDispatcher {
                reply,
                delay,
                dispatched: Arc::clone(&dispatched),
            }),
            speech,
            Arc::new(RecordingOpener {
                opened: Arc::clone(&opened),
            }),
            Arc::clone(&history),
            input_tx.clone(),
            event_tx,
        );

        tokio::spawn(async move { engine.run(input_rx).await });

        Harness {
            input_tx,
            event_rx,
            history,
            dispatched,
            opened,
            spoken,
        }
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<EngineEvent>,
        mut matches: impl FnMut(&EngineEvent) -> bool,
    ) -> EngineEvent {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.expect("event channel closed");
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_open_command_cycle() {
        let mut harness = spawn_engine(
            Ok((
                "Opening YouTube sir".to_string(),
                Some(CommandAction::OpenUrl {
                    url: "https://youtube.com".to_string(),
                }),
            )),
            Duration::ZERO,
        );

        harness
            .input_tx
            .send(Input::TextSubmitted("Open YouTube".to_string()))
            .await
            .unwrap();

        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::CycleFinished { .. })
        })
        .await;

        assert_eq!(
            harness.opened.lock().unwrap().as_slice(),
            ["https://youtube.com"]
        );
        assert_eq!(harness.spoken.lock().unwrap().as_slice(), ["Opening YouTube sir"]);

        let history = harness.history.read().await.snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command, "Open YouTube");
        assert_eq!(history[0].response, "Opening YouTube sir");
    }

    #[tokio::test]
    async fn test_dispatch_failure_substitutes_apology() {
        let mut harness = spawn_engine(Err(()), Duration::ZERO);

        harness
            .input_tx
            .send(Input::TextSubmitted("open youtube".to_string()))
            .await
            .unwrap();

        let delivered = wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::ResponseDelivered { .. })
        })
        .await;
        if let EngineEvent::ResponseDelivered { response, .. } = delivered {
            assert_eq!(response, APOLOGY_RESPONSE);
        }

        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::CycleFinished { .. })
        })
        .await;

        // The apology is spoken and recorded; nothing is opened
        assert_eq!(harness.spoken.lock().unwrap().as_slice(), [APOLOGY_RESPONSE]);
        assert!(harness.opened.lock().unwrap().is_empty());

        let history = harness.history.read().await.snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].response, APOLOGY_RESPONSE);
    }

    #[tokio::test]
    async fn test_toggle_during_cycle_is_dropped_not_queued() {
        let mut harness = spawn_engine(
            Ok(("One moment sir".to_string(), None)),
            Duration::from_millis(100),
        );

        harness
            .input_tx
            .send(Input::TextSubmitted("status report".to_string()))
            .await
            .unwrap();
        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::ProcessingStarted { .. })
        })
        .await;

        harness.input_tx.send(Input::ToggleRequested).await.unwrap();

        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::CycleFinished { .. })
        })
        .await;

        // A queued toggle would start capture now and fail with
        // capture-unavailable; give it a moment to prove nothing happens
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(event) = harness.event_rx.try_recv() {
            assert!(
                !matches!(event, EngineEvent::CaptureFailed { .. }),
                "toggle must be dropped, not deferred"
            );
        }
    }

    #[tokio::test]
    async fn test_empty_final_transcript_skips_dispatch() {
        let mut harness = spawn_engine(Ok(("unused".to_string(), None)), Duration::ZERO);

        harness.input_tx.send(Input::CaptureStarted).await.unwrap();
        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::ListeningStarted)
        })
        .await;

        harness
            .input_tx
            .send(Input::TranscriptFinal(String::new()))
            .await
            .unwrap();
        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::TranscriptUpdated { is_final: true, .. })
        })
        .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.dispatched.lock().unwrap().is_empty());
        assert!(harness.history.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_spoken_and_manual_input_share_the_cycle() {
        let mut harness = spawn_engine(Ok(("At your service".to_string(), None)), Duration::ZERO);

        // Spoken path
        harness.input_tx.send(Input::CaptureStarted).await.unwrap();
        harness
            .input_tx
            .send(Input::TranscriptFinal("first command".to_string()))
            .await
            .unwrap();
        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::CycleFinished { .. })
        })
        .await;

        // Manual path
        harness
            .input_tx
            .send(Input::TextSubmitted("second command".to_string()))
            .await
            .unwrap();
        wait_for(&mut harness.event_rx, |e| {
            matches!(e, EngineEvent::CycleFinished { .. })
        })
        .await;

        assert_eq!(
            harness.dispatched.lock().unwrap().as_slice(),
            ["first command", "second command"]
        );
        let history = harness.history.read().await.snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].command, "second command");
    }
}
