//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Mode, Notification, Request, Response};
pub use server::Server;
