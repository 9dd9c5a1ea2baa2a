//! Unix domain socket server for IPC
//!
//! Provides request-response communication, forwards control requests to
//! the interaction engine, and pushes engine events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::EngineEvent;
use crate::history::HistoryStore;
use crate::state::Input;

use super::protocol::{DaemonStatus, Mode, Notification, Request, Response};

/// Upper bound on a single IPC message
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    event_tx: broadcast::Sender<EngineEvent>,
    input_tx: mpsc::Sender<Input>,
    history: Arc<RwLock<HistoryStore>>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<EngineEvent>,
        history: Arc<RwLock<HistoryStore>>,
        capture_available: bool,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let status = DaemonStatus {
            capture_available,
            ..DaemonStatus::default()
        };
        let state = Arc::new(RwLock::new(ServerState {
            status,
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            event_tx,
            input_tx,
            history,
        })
    }

    /// Update the status view from an engine event
    pub async fn apply_event(&self, event: &EngineEvent) {
        let mut state = self.state.write().await;
        let status = &mut state.status;
        match event {
            EngineEvent::ListeningStarted => {
                status.mode = Mode::Listening;
                status.transcript.clear();
                status.last_error = None;
            }
            EngineEvent::TranscriptUpdated { transcript, .. } => {
                status.transcript = transcript.clone();
            }
            EngineEvent::ListeningStopped => status.mode = Mode::Idle,
            EngineEvent::ProcessingStarted { command } => {
                status.mode = Mode::Processing;
                status.transcript = command.clone();
            }
            EngineEvent::ResponseDelivered { response, .. } => {
                status.last_response = response.clone();
            }
            EngineEvent::CaptureFailed { code } => {
                status.last_error = Some(code.clone());
                status.mode = Mode::Idle;
            }
            EngineEvent::CycleFinished { .. } => status.mode = Mode::Idle,
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let history = Arc::clone(&self.history);
                    let input_tx = self.input_tx.clone();
                    let event_tx = self.event_tx.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, history, input_tx, event_tx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        history: Arc<RwLock<HistoryStore>>,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let mut forwarder: Option<tokio::task::JoinHandle<()>> = None;

        let result = loop {
            let request = match Self::read_request(&mut reader).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            debug!(?request, "received request");

            let subscribe = matches!(request, Request::Subscribe);
            let response =
                Self::process_request(request, &state, &history, &input_tx).await;

            if subscribe && forwarder.is_none() {
                forwarder = Some(Self::spawn_forwarder(
                    event_tx.subscribe(),
                    Arc::clone(&writer),
                ));
                debug!("client subscribed to notifications");
            }

            let mut writer = writer.lock().await;
            if let Err(e) = Self::send_message(&mut writer, &response).await {
                break Err(e);
            }
        };

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        result
    }

    /// Read one length-prefixed request; `None` on clean disconnect
    async fn read_request(reader: &mut OwnedReadHalf) -> Result<Option<Request>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(None);
        }

        let mut msg_buf = vec![0u8; len];
        reader.read_exact(&mut msg_buf).await?;

        let request = serde_json::from_slice(&msg_buf).context("failed to parse request")?;
        Ok(Some(request))
    }

    /// Forward engine events to a subscribed client
    fn spawn_forwarder(
        mut event_rx: broadcast::Receiver<EngineEvent>,
        writer: Arc<Mutex<OwnedWriteHalf>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        let notification = Notification::StateEvent(event);
                        let mut writer = writer.lock().await;
                        if Self::send_message(&mut writer, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(
        writer: &mut OwnedWriteHalf,
        msg: &T,
    ) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and build the response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        history: &Arc<RwLock<HistoryStore>>,
        input_tx: &mpsc::Sender<Input>,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                Response::Status(state.status.clone())
            }

            Request::GetHistory => Response::History {
                entries: history.read().await.snapshot(),
            },

            Request::ToggleListening => {
                if input_tx.send(Input::ToggleRequested).await.is_err() {
                    return engine_gone();
                }
                Response::Accepted
            }

            Request::SubmitText { text } => {
                if text.trim().is_empty() {
                    return Response::Error {
                        code: "empty_command".to_string(),
                        message: "command text must not be blank".to_string(),
                    };
                }
                if input_tx.send(Input::TextSubmitted(text)).await.is_err() {
                    return engine_gone();
                }
                Response::Accepted
            }

            Request::Subscribe => Response::Subscribed,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

fn engine_gone() -> Response {
    Response::Error {
        code: "engine_unavailable".to_string(),
        message: "interaction engine is not running".to_string(),
    }
}
