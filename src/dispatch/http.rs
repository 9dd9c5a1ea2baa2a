//! HTTP client for the remote command interpreter

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{CommandAction, CommandDispatcher, CommandResult, RemoteError};

#[derive(Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
    timestamp: DateTime<Utc>,
}

/// Wire shape of an interpreter reply
#[derive(Deserialize)]
struct InterpreterReply {
    response: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

impl InterpreterReply {
    fn into_result(self) -> CommandResult {
        let action = match (self.action.as_deref(), self.url) {
            (Some("open_url"), Some(url)) => Some(CommandAction::OpenUrl { url }),
            _ => None,
        };
        CommandResult {
            response_text: self.response,
            action,
        }
    }
}

/// Dispatcher backed by the interpreter's HTTP endpoint
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl CommandDispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        command: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CommandResult, RemoteError> {
        debug!(%command, "dispatching command");

        let request = CommandRequest { command, timestamp };
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "interpreter error");
            return Err(RemoteError::Status(status));
        }

        let reply: InterpreterReply = response.json().await?;
        if !reply.success {
            debug!("interpreter flagged command as unrecognized");
        }
        info!(response = %reply.response, "command interpreted");

        Ok(reply.into_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_iso8601_timestamp() {
        let timestamp = "2024-06-01T10:30:00Z".parse().unwrap();
        let request = CommandRequest {
            command: "open youtube",
            timestamp,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("open youtube"));
        assert!(json.contains("2024-06-01T10:30:00Z"));
    }

    #[test]
    fn test_reply_maps_open_url_action() {
        let reply: InterpreterReply = serde_json::from_str(
            r#"{"response":"Opening YouTube for you, sir.","action":"open_url","url":"https://www.youtube.com"}"#,
        )
        .unwrap();
        let result = reply.into_result();
        assert_eq!(result.response_text, "Opening YouTube for you, sir.");
        assert_eq!(
            result.action,
            Some(CommandAction::OpenUrl {
                url: "https://www.youtube.com".to_string()
            })
        );
    }

    #[test]
    fn test_reply_without_action_fields() {
        let reply: InterpreterReply =
            serde_json::from_str(r#"{"response":"Hello sir."}"#).unwrap();
        assert!(reply.success);
        let result = reply.into_result();
        assert!(result.action.is_none());
    }

    #[test]
    fn test_action_without_url_is_dropped() {
        let reply: InterpreterReply =
            serde_json::from_str(r#"{"response":"Done.","action":"open_url"}"#).unwrap();
        assert!(reply.into_result().action.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_interpreter_is_a_remote_error() {
        let dispatcher = HttpDispatcher::new(
            "http://127.0.0.1:9/api/process-command".to_string(),
            Duration::from_millis(500),
        );
        let result = dispatcher.dispatch("hello", Utc::now()).await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }
}
