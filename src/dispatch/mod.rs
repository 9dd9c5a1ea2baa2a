//! Command dispatch to the remote interpreter

mod http;

pub use http::HttpDispatcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A structured action carried by an interpreter reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Open an external resource
    OpenUrl { url: String },
}

/// Result of a successfully interpreted command
///
/// Immutable once constructed; `response_text` is always populated.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub response_text: String,
    pub action: Option<CommandAction>,
}

/// Dispatch failure: no partial result is available
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("interpreter request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("interpreter returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Sends finalized commands to the remote interpreter
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Interpret a non-empty command
    ///
    /// On failure callers must not assume any reply field is populated and
    /// substitute the fixed apology response instead.
    async fn dispatch(
        &self,
        command: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CommandResult, RemoteError>;
}
