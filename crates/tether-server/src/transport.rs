//! WebSocket and HTTP transport.
//!
//! Serves the relay over axum: `GET /` and `GET /ws` upgrade to a WebSocket,
//! `GET /health` reports [`StatusReport`](crate::StatusReport) as JSON.
//!
//! Each socket is split into a reader, which feeds the shared driver one event
//! at a time, and a writer task draining a bounded channel of
//! [`OUTBOUND_CAPACITY`] frames. The driver sends through a [`ChannelHandle`]
//! that only tries to push into that channel, so a slow client never blocks
//! the driver and per-connection order is FIFO. A client that stops reading
//! fills its queue and further sends to it fail until the writer catches up.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tether_core::{ConnectionHandle, SendError};
use tether_proto::ServerMessage;
use tokio::sync::{
    Mutex, RwLock,
    mpsc::{self, error::TrySendError},
};

use crate::{
    driver::{LogLevel, RelayDriver, ServerAction, ServerEvent, StatusReport},
    error::ServerError,
    system_env::SystemEnv,
};

/// Frames a connection may have queued before sends to it start failing.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encoded JSON text frame
    Text(String),
    /// Send a close frame and stop writing
    Close {
        /// Close reason sent to the peer
        reason: String,
    },
}

/// Production [`ConnectionHandle`]: encodes and queues for the writer task.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelHandle {
    /// Wrap the sending side of a connection's outbound queue.
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }
}

impl ConnectionHandle for ChannelHandle {
    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        let text = message.encode()?;
        self.tx.try_send(Outbound::Text(text)).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Transport("outbound queue full".to_string()),
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

/// Driver shared by every connection task.
pub type SharedDriver = Arc<Mutex<RelayDriver<SystemEnv, ChannelHandle>>>;

/// Outbound queues of live sockets, for closing them from outside the driver.
#[derive(Debug, Default)]
pub struct SharedState {
    outbound: RwLock<HashMap<u64, mpsc::Sender<Outbound>>>,
}

impl SharedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sockets with a live writer queue.
    pub async fn len(&self) -> usize {
        self.outbound.read().await.len()
    }

    /// Check if no sockets are registered.
    pub async fn is_empty(&self) -> bool {
        self.outbound.read().await.is_empty()
    }
}

/// Router state.
#[derive(Clone)]
pub struct AppState {
    driver: SharedDriver,
    shared: Arc<SharedState>,
}

impl AppState {
    /// Bundle the driver and socket table for the router.
    pub fn new(driver: SharedDriver, shared: Arc<SharedState>) -> Self {
        Self { driver, shared }
    }
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.driver.lock().await.status())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register a new socket with the driver and return its session ID.
///
/// The outbound queue is published before the accept event so a
/// `CloseConnection` for this session can reach it.
async fn accept(state: &AppState, tx: mpsc::Sender<Outbound>) -> Result<u64, ServerError> {
    let mut driver = state.driver.lock().await;
    let session_id = driver.allocate_session_id();
    state.shared.outbound.write().await.insert(session_id, tx.clone());

    let event = ServerEvent::ConnectionAccepted { session_id, handle: ChannelHandle::new(tx) };
    match driver.process_event(event) {
        Ok(actions) => {
            execute_actions(actions, &state.shared).await;
            Ok(session_id)
        },
        Err(e) => {
            state.shared.outbound.write().await.remove(&session_id);
            Err(e.into())
        },
    }
}

/// Feed one event to the driver and execute the resulting actions.
///
/// The driver lock is held until the actions are executed so that frames
/// from consecutive events keep their order.
async fn dispatch(state: &AppState, event: ServerEvent<ChannelHandle>) -> Result<(), ServerError> {
    let mut driver = state.driver.lock().await;
    let actions = driver.process_event(event)?;
    execute_actions(actions, &state.shared).await;
    Ok(())
}

/// Drive one WebSocket from accept to reconciliation.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);

    let session_id = match accept(&state, tx).await {
        Ok(session_id) => session_id,
        Err(e) => {
            tracing::error!("Failed to register connection: {}", e);
            return;
        },
    };

    tracing::debug!("New connection: {}", session_id);

    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                },
                Outbound::Close { reason } => {
                    let frame = CloseFrame { code: close_code::NORMAL, reason: reason.into() };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Close frame send failed: {}", e);
                    }
                    break;
                },
            }
        }
    });

    let reason = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event =
                        ServerEvent::MessageReceived { session_id, text: text.as_str().to_owned() };
                    if let Err(e) = dispatch(&state, event).await {
                        tracing::warn!("Message processing error: {}", e);
                    }
                },
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!("Ignoring binary frame from session {}", session_id);
                },
                Some(Ok(Message::Close(_))) | None => break "peer closed",
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::debug!("Read error on session {}: {}", session_id, e);
                    break "read error";
                },
            },
            _ = &mut writer => break "writer stopped",
        }
    };

    state.shared.outbound.write().await.remove(&session_id);

    let event = ServerEvent::ConnectionClosed { session_id, reason: reason.to_string() };
    if let Err(e) = dispatch(&state, event).await {
        tracing::error!("Failed to reconcile session {}: {}", session_id, e);
    }

    writer.abort();
    tracing::debug!("Connection closed: {} ({})", session_id, reason);
}

/// Queue a close frame for one socket.
///
/// A full queue means the writer is stalled on the peer; the close is
/// dropped and the socket ends when the peer read fails.
fn signal_close(session_id: u64, tx: &mpsc::Sender<Outbound>, reason: String) {
    match tx.try_send(Outbound::Close { reason }) {
        Ok(()) => {},
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Session {} outbound queue full, close frame dropped", session_id);
        },
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Session {} writer already gone", session_id);
        },
    }
}

/// Execute server actions.
pub async fn execute_actions(actions: Vec<ServerAction>, shared: &SharedState) {
    for action in actions {
        match action {
            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                let Some(tx) = shared.outbound.write().await.remove(&session_id) else {
                    continue;
                };
                signal_close(session_id, &tx, reason);
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

/// Ask every live socket to close. Returns how many were signalled.
pub async fn close_all(shared: &SharedState, reason: &str) -> usize {
    let drained: Vec<_> = shared.outbound.write().await.drain().collect();
    let count = drained.len();
    for (session_id, tx) in drained {
        signal_close(session_id, &tx, reason.to_string());
    }
    count
}
