//! Viewer router and WebSocket handler
//!
//! Implements the per-connection CONNECTING/OPEN/CLOSING/CLOSED state machine.
//! On upgrade the write half of the socket is registered with the hub; the
//! handler then watches the read half until the viewer goes away or the hub
//! drops the write half, and in either case releases the socket.

use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use alphacast_core::RateReport;

use crate::hub::HubHandle;
use crate::registry::ChannelId;
use crate::sink::WsSink;

/// Why an open connection is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame received or the stream ended
    ClientClosed,
    /// Read error on the socket
    Transport,
    /// The hub dropped the channel
    Released,
}

/// Per-connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Upgraded, not yet registered
    Connecting,
    /// Registered and receiving frames
    Open { id: ChannelId },
    /// Leaving the registry
    Closing { id: ChannelId, reason: CloseReason },
    /// Terminal
    Closed,
}

impl ConnectionState {
    /// CONNECTING -> OPEN once the channel is registered
    fn accept(self, id: ChannelId) -> Self {
        match self {
            ConnectionState::Connecting => ConnectionState::Open { id },
            other => other,
        }
    }

    /// OPEN -> CLOSING on client close or transport error
    fn close(self, reason: CloseReason) -> Self {
        match self {
            ConnectionState::Open { id } => ConnectionState::Closing { id, reason },
            other => other,
        }
    }

    /// CLOSING -> CLOSED after unregistering; CONNECTING -> CLOSED if
    /// registration never happened
    fn finish(self) -> Self {
        match self {
            ConnectionState::Closing { .. } | ConnectionState::Connecting => {
                ConnectionState::Closed
            }
            other => other,
        }
    }
}

/// Shared state for the HTTP routes
#[derive(Clone)]
pub struct ViewerRouter {
    hub: HubHandle,
}

impl ViewerRouter {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(router): State<ViewerRouter>) -> Response {
    if !router.hub.is_running() {
        warn!("WebSocket upgrade rejected: broadcast hub stopped");
        return (StatusCode::SERVICE_UNAVAILABLE, "Stream unavailable").into_response();
    }

    ws.on_failed_upgrade(|e| warn!(error = %e, "WebSocket handshake failed"))
        .on_upgrade(move |socket| handle_client(socket, router.hub))
}

/// Drive one viewer connection from registration to teardown
async fn handle_client(socket: WebSocket, hub: HubHandle) {
    let (sink, mut stream) = socket.split();
    let id = ChannelId::next();
    let released = CancellationToken::new();
    let mut state = ConnectionState::Connecting;

    let sink = WsSink::new(sink, released.clone());
    if let Err(e) = hub.register(id, Box::new(sink)).await {
        warn!(channel = %id, error = %e, "Could not register viewer");
        state = state.finish();
        debug!(channel = %id, ?state, "Connection handler finished");
        return;
    }
    state = state.accept(id);
    info!(channel = %id, "Viewer connected");

    while let ConnectionState::Open { .. } = state {
        tokio::select! {
            _ = released.cancelled() => {
                state = state.close(CloseReason::Released);
            }
            message = stream.next() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    state = state.close(CloseReason::ClientClosed);
                }
                Some(Ok(_)) => {
                    // Text, binary, ping and pong are accepted but not acted upon
                }
                Some(Err(e)) => {
                    debug!(channel = %id, error = %e, "WebSocket error");
                    state = state.close(CloseReason::Transport);
                }
            },
        }
    }

    if let ConnectionState::Closing { id, reason } = state {
        debug!(channel = %id, ?reason, "Viewer closing");
        if reason != CloseReason::Released {
            // The dispatcher may already have dropped this channel
            let _ = hub.unregister(id).await;
        }
        state = state.finish();
    }

    info!(channel = %id, ?state, "Viewer disconnected");
}

/// Body of `GET /stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub viewers: usize,
    pub report: Option<RateReport>,
}

/// Current viewer count and the last throughput report
pub async fn stats_handler(State(router): State<ViewerRouter>) -> Json<StatsResponse> {
    Json(StatsResponse {
        viewers: router.hub.viewer_count(),
        report: router.hub.latest_report(),
    })
}
