//! Core state machine implementation
//!
//! Handles transitions between Idle, Listening, and Processing in response
//! to capture, dispatch, and control events. All interaction state is
//! mutated here and nowhere else; the async driver only carries out the
//! actions this module returns.

use tracing::{debug, info};

/// The three possible modes of the interaction engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No active capture, no command in flight
    Idle,
    /// Capture session active, transcript accumulating
    Listening,
    /// A finalized command is being dispatched and spoken
    Processing,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "Idle"),
            Mode::Listening => write!(f, "Listening"),
            Mode::Processing => write!(f, "Processing"),
        }
    }
}

/// The interaction state owned by the engine
///
/// Exactly one mode is active at any instant. Listening and Processing are
/// mutually exclusive: a capture toggle never interrupts an in-flight
/// command, and a new capture session cannot begin until the current cycle
/// returns to Idle.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    /// Current mode
    pub mode: Mode,
    /// Latest transcript (interim while listening, final once committed)
    pub transcript: String,
    /// Response text from the most recent completed exchange
    pub last_response: String,
    /// Most recent capture error code, if any
    pub last_error: Option<String>,
}

impl InteractionState {
    /// Create a fresh state in Idle
    pub fn new() -> Self {
        Self::default()
    }
}

/// Inputs to the transition function
#[derive(Debug, Clone)]
pub enum Input {
    /// The capture toggle was invoked (IPC or UI)
    ToggleRequested,
    /// The capture backend confirmed a session started
    CaptureStarted,
    /// The capture session ended without a final transcript
    CaptureStopped,
    /// An interim transcript arrived (latest wins)
    TranscriptPartial(String),
    /// The committed transcript for this utterance arrived
    TranscriptFinal(String),
    /// Manual text entry, bypassing capture
    TextSubmitted(String),
    /// The capture backend reported a terminal error
    CaptureFailed { code: String },
    /// Dispatch resolved (interpreter reply or apology substitute)
    DispatchCompleted { response: String },
    /// The command cycle completed: response spoken, ready to record
    CycleFinished { command: String, response: String },
}

/// Side effects the driver must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Begin a capture session
    StartCapture,
    /// Abort the active capture session
    StopCapture,
    /// Dispatch the command and run the speech/history cycle
    BeginCycle { command: String },
    /// Append one history entry for the completed exchange
    RecordExchange { command: String, response: String },
}

/// Apply one input to the state, returning the action to carry out
///
/// This is the single transition function: every mode/input pair is decided
/// here, so the mutual-exclusion and one-in-flight invariants are visible
/// in one place.
pub fn transition(state: &mut InteractionState, input: Input) -> Option<Action> {
    match state.mode {
        Mode::Idle => on_idle(state, input),
        Mode::Listening => on_listening(state, input),
        Mode::Processing => on_processing(state, input),
    }
}

/// Handle an input while Idle
fn on_idle(state: &mut InteractionState, input: Input) -> Option<Action> {
    match input {
        Input::ToggleRequested => Some(Action::StartCapture),
        Input::CaptureStarted => {
            state.transcript.clear();
            state.last_error = None;
            set_mode(state, Mode::Listening);
            None
        }
        Input::CaptureFailed { code } => {
            // Start failure or unavailable backend: surface it, stay Idle
            state.last_error = Some(code);
            None
        }
        Input::TextSubmitted(text) => begin_command(state, text),
        other => {
            debug!(input = ?other, "ignored while idle");
            None
        }
    }
}

/// Handle an input while Listening
fn on_listening(state: &mut InteractionState, input: Input) -> Option<Action> {
    match input {
        Input::ToggleRequested => Some(Action::StopCapture),
        Input::TranscriptPartial(text) => {
            state.transcript = text;
            None
        }
        Input::TranscriptFinal(text) => {
            // The final transcript replaces any interim text entirely
            state.transcript = text.clone();
            if text.trim().is_empty() {
                set_mode(state, Mode::Idle);
                None
            } else {
                begin_command(state, text)
            }
        }
        Input::CaptureStopped => {
            set_mode(state, Mode::Idle);
            None
        }
        Input::CaptureFailed { code } => {
            state.last_error = Some(code);
            set_mode(state, Mode::Idle);
            None
        }
        Input::TextSubmitted(_) => {
            // Stop capture first; accepting here could let the active
            // session finalize into a cycle that is already running
            debug!("manual submission dropped while listening");
            None
        }
        other => {
            debug!(input = ?other, "ignored while listening");
            None
        }
    }
}

/// Handle an input while Processing
fn on_processing(state: &mut InteractionState, input: Input) -> Option<Action> {
    match input {
        Input::ToggleRequested => {
            // A capture toggle never interrupts an in-flight command
            debug!("capture toggle ignored while processing");
            None
        }
        Input::TextSubmitted(_) => {
            debug!("manual submission dropped while processing");
            None
        }
        Input::DispatchCompleted { response } => {
            state.last_response = response;
            None
        }
        Input::CycleFinished { command, response } => {
            state.last_response = response.clone();
            set_mode(state, Mode::Idle);
            Some(Action::RecordExchange { command, response })
        }
        other => {
            // Stale capture events from a session that already ended
            debug!(input = ?other, "ignored while processing");
            None
        }
    }
}

/// Enter Processing for a non-blank command
fn begin_command(state: &mut InteractionState, text: String) -> Option<Action> {
    if text.trim().is_empty() {
        debug!("blank command dropped");
        return None;
    }
    state.transcript = text.clone();
    set_mode(state, Mode::Processing);
    Some(Action::BeginCycle { command: text })
}

/// Perform a mode change with transition logging
fn set_mode(state: &mut InteractionState, to: Mode) {
    if state.mode != to {
        info!(from = %state.mode, to = %to, "state transition");
        state.mode = to;
    }
}
