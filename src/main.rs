//! valet-daemon: background daemon for a voice-driven command assistant
//!
//! The daemon provides:
//! - Speech capture through a pluggable recognition backend
//! - An explicit state machine sequencing each command cycle
//! - Command interpretation via a remote HTTP interpreter
//! - Spoken replies with a two-tier voice fallback
//! - An IPC server for UI clients (toggle, text entry, status, history)

mod capture;
mod config;
mod dispatch;
mod engine;
mod events;
mod history;
mod ipc;
mod lifecycle;
mod speech;
mod state;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{CommandRecognizer, NullRecognizer, SpeechCaptureAdapter, SpeechRecognizer};
use crate::config::Config;
use crate::dispatch::HttpDispatcher;
use crate::engine::{InteractionEngine, SystemOpener};
use crate::events::EngineEvent;
use crate::history::HistoryStore;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::speech::{
    AudioPlayer, EspeakSynthesizer, NativeSynthesizer, SpeechOutputAdapter, VoiceService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "valet-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Capture adapter / IPC clients / command cycle -> interaction engine
    let (input_tx, input_rx) = mpsc::channel(32);
    // Interaction engine -> IPC server and subscribed clients
    let (event_tx, _event_rx) = broadcast::channel::<EngineEvent>(64);

    // Recognition backend: an external recognizer process when configured
    let recognizer: Arc<dyn SpeechRecognizer> = match &config.recognizer_command {
        Some(command) => Arc::new(CommandRecognizer::new(command.clone())),
        None => Arc::new(NullRecognizer),
    };
    let capture = Arc::new(SpeechCaptureAdapter::new(
        recognizer,
        config.locale.clone(),
        input_tx.clone(),
    ));
    if capture.is_available() {
        info!("speech capture ready");
    } else {
        warn!("no recognizer configured - set VALET_RECOGNIZER; manual text entry remains available");
    }

    // Speech output tiers: networked voice service, then native synthesis
    let player = AudioPlayer::detect(config.player_command.as_deref());
    if player.is_none() {
        warn!("no audio player found - voice service tier disabled");
    }
    let remote_voice = player.map(|player| {
        VoiceService::new(
            config.voice_service_url.clone(),
            config.voice.clone(),
            player,
            config.data_dir.clone(),
        )
    });
    let native: Option<Arc<dyn NativeSynthesizer>> =
        EspeakSynthesizer::detect().map(|s| Arc::new(s) as Arc<dyn NativeSynthesizer>);
    if native.is_none() {
        warn!("espeak-ng not found - native synthesis tier disabled");
    }
    let speech = Arc::new(SpeechOutputAdapter::new(remote_voice, native));

    // Remote command interpreter
    let dispatcher = Arc::new(HttpDispatcher::new(
        config.interpreter_url.clone(),
        config.dispatch_timeout,
    ));

    let history = Arc::new(RwLock::new(HistoryStore::new()));

    let mut engine = InteractionEngine::new(
        Arc::clone(&capture),
        dispatcher,
        speech,
        Arc::new(SystemOpener),
        Arc::clone(&history),
        input_tx.clone(),
        event_tx.clone(),
    );

    // Create IPC server
    let server = Server::new(
        &config.socket_path,
        input_tx.clone(),
        event_tx.clone(),
        Arc::clone(&history),
        capture.is_available(),
    )?;

    // Subscribe to engine events to keep the IPC status view current
    let mut status_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the interaction engine (processes capture/IPC/cycle inputs)
        _ = engine.run(input_rx) => {
            info!("interaction engine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror engine events into the IPC status view
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "engine event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "engine event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("engine event handler exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup: abort any active capture session, stop serving clients.
    // The in-flight cycle (if any) was cancelled with the engine future.
    info!("shutting down...");

    capture.stop().await;
    server.shutdown().await;

    info!("valet-daemon stopped");

    Ok(())
}
