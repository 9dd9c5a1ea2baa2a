//! Interaction state machine
//!
//! Provides an explicit state machine with three modes:
//! - Idle: no capture session, no command in flight
//! - Listening: a capture session is active
//! - Processing: a finalized command is being dispatched and spoken

mod machine;

pub use machine::{transition, Action, Input, InteractionState, Mode};
