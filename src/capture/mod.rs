//! Speech capture: recognition boundary and session adapter
//!
//! The recognition engine itself lives behind the [`SpeechRecognizer`]
//! trait; the adapter owns session state and feeds transcript events into
//! the interaction engine.

mod adapter;
mod recognizer;

pub use adapter::SpeechCaptureAdapter;
pub use recognizer::{
    CaptureError, CommandRecognizer, NullRecognizer, RecognizerEvent, SpeechRecognizer,
};
