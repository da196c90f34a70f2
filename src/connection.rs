//! Connection lifecycle.
//!
//! [`Connection::spawn`] starts a background tokio task that owns the
//! socket and runs until [`Connection::shutdown`]:
//!
//! 1. Publish [`ConnectionState::Connecting`] and dial the endpoint
//! 2. On success, build a fresh [`Router`] and live [`ServiceHandle`],
//!    publish the handle, then [`ConnectionState::Connected`]
//! 3. Pump inbound frames into the router and queued commands onto the
//!    socket until it closes or errors
//! 4. Clear the active handle, publish [`ConnectionState::Reconnecting`],
//!    wait the fixed delay and go back to 1
//!
//! Consumers observe only two latest-value streams: the connection state
//! and the [`ActiveHandle`]. Nothing outside this task opens or closes the
//! socket.
//!
//! # Stale handles
//!
//! Every connection gets its own router, streams and outbound queue. When
//! it closes, the router (and with it the write side of every stream) is
//! dropped and the queue receiver goes away, so a handle kept from an old
//! connection never emits again and silently discards commands.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::router::Router;
use crate::service::{LiveSender, ServiceHandle};
use crate::stream::{Stream, StreamSource};
use crate::ws::{self, FrameReader, FrameWriter, Inbound};

/// Latest-value stream of the handle consumers should use; `None` while
/// no connection is open.
pub type ActiveHandle = Stream<Option<ServiceHandle>>;

/// Lifecycle phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionState {
    /// Not running (before spawn or after shutdown).
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open, live handle active.
    Connected,
    /// Waiting before the next attempt.
    #[serde(rename_all = "camelCase")]
    Reconnecting {
        /// Consecutive failed or closed attempts so far.
        attempt: u32,
        /// Delay until the next attempt, in milliseconds.
        next_retry_ms: u64,
    },
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting {
                attempt,
                next_retry_ms,
            } => write!(f, "reconnecting (attempt {attempt}, retry in {next_retry_ms}ms)"),
        }
    }
}

/// Internal configuration for the connection loop.
#[derive(Debug, Clone)]
struct LoopSettings {
    /// Endpoint dialed on every attempt.
    url: String,
    /// Fixed pause between attempts.
    reconnect_delay: Duration,
    /// History length of the info stream.
    info_history: usize,
}

/// Owner of the background connection task.
///
/// Dropping it without calling [`Connection::shutdown`] still stops the
/// task, but does not wait for it.
#[derive(Debug)]
pub struct Connection {
    state: Stream<ConnectionState>,
    active: ActiveHandle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start connecting to `config.endpoint()`. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn spawn(config: &Config) -> Self {
        let settings = LoopSettings {
            url: config.endpoint(),
            reconnect_delay: config.reconnect_delay(),
            info_history: config.info_history,
        };

        let state = StreamSource::latest();
        state.emit(ConnectionState::Disconnected);
        let active = StreamSource::latest();
        active.emit(None);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state_stream = state.stream();
        let active_stream = active.stream();
        let task = tokio::spawn(run_connection_loop(settings, state, active, shutdown_rx));

        Self {
            state: state_stream,
            active: active_stream,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Lifecycle state stream.
    #[must_use]
    pub fn state(&self) -> Stream<ConnectionState> {
        self.state.clone()
    }

    /// Active handle stream.
    #[must_use]
    pub fn active(&self) -> ActiveHandle {
        self.active.clone()
    }

    /// Stop the loop, close the socket and wait for the task to finish.
    /// The state ends as [`ConnectionState::Disconnected`].
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("[Connection] Task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Wait until `active` holds a handle and return it.
///
/// Returns immediately when one is already active.
pub async fn wait_for_handle(active: &ActiveHandle) -> Option<ServiceHandle> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = active.subscribe(move |handle: &Option<ServiceHandle>| {
        if let Some(handle) = handle {
            let _ = tx.send(handle.clone());
        }
    });
    rx.recv().await
}

/// Result of the inner message loop.
enum ConnectionLoopExit {
    /// Shutdown was requested -- exit entirely.
    Shutdown,
    /// Connection was lost -- should reconnect.
    Disconnected,
}

/// Main connection loop with fixed-delay reconnection.
async fn run_connection_loop(
    settings: LoopSettings,
    state: StreamSource<ConnectionState>,
    active: StreamSource<Option<ServiceHandle>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let next_retry_ms = settings.reconnect_delay.as_millis() as u64;
    let mut attempt: u32 = 0;

    loop {
        state.emit(ConnectionState::Connecting);
        log::info!("[Connection] Connecting to {}", settings.url);

        let connected = tokio::select! {
            result = ws::connect(&settings.url) => result,
            _ = &mut shutdown_rx => break,
        };

        match connected {
            Ok((writer, reader)) => {
                log::info!("[Connection] Connected to {}", settings.url);
                attempt = 0;

                let router = Router::new(settings.info_history);
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let handle = router.handle(Arc::new(LiveSender::new(outbound_tx)));
                active.emit(Some(handle));
                state.emit(ConnectionState::Connected);

                let exit =
                    run_message_loop(&router, writer, reader, outbound_rx, &mut shutdown_rx).await;

                active.emit(None);
                drop(router);

                if let ConnectionLoopExit::Shutdown = exit {
                    break;
                }
            }
            Err(e) => {
                log::warn!("[Connection] {e:#}");
            }
        }

        attempt = attempt.saturating_add(1);
        log::info!(
            "[Connection] Reconnecting in {}ms (attempt {})",
            next_retry_ms,
            attempt
        );
        state.emit(ConnectionState::Reconnecting {
            attempt,
            next_retry_ms,
        });

        tokio::select! {
            () = tokio::time::sleep(settings.reconnect_delay) => {}
            _ = &mut shutdown_rx => break,
        }
    }

    log::info!("[Connection] Shut down");
    active.emit(None);
    state.emit(ConnectionState::Disconnected);
}

/// Inner message loop for a single WebSocket connection.
///
/// Frames are routed synchronously, so all stream deliveries for one frame
/// complete before the next frame is read. Queued commands go out ahead of
/// inbound traffic, and are flushed before a shutdown request is honoured.
async fn run_message_loop(
    router: &Router,
    mut writer: FrameWriter,
    mut reader: FrameReader,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> ConnectionLoopExit {
    loop {
        tokio::select! {
            biased;

            Some(frame) = outbound_rx.recv() => {
                log::debug!("[Connection] -> {frame}");
                if let Err(e) = writer.send(&frame).await {
                    log::warn!("[Connection] {e:#}");
                    return ConnectionLoopExit::Disconnected;
                }
            }

            inbound = reader.recv() => {
                match inbound {
                    Some(Ok(Inbound::Frame(text))) => {
                        router.route(&text);
                    }
                    Some(Ok(Inbound::Closed { code, reason })) => {
                        log::warn!("[Connection] Closed by controller ({code}): {reason}");
                        return ConnectionLoopExit::Disconnected;
                    }
                    Some(Err(e)) => {
                        log::warn!("[Connection] {e:#}");
                        return ConnectionLoopExit::Disconnected;
                    }
                    None => {
                        log::warn!("[Connection] WebSocket stream ended");
                        return ConnectionLoopExit::Disconnected;
                    }
                }
            }

            _ = &mut *shutdown_rx => {
                log::info!("[Connection] Shutdown requested, closing connection");
                let _ = writer.close().await;
                return ConnectionLoopExit::Shutdown;
            }
        }
    }
}
