//! Outbound half of a viewer connection

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio_util::sync::{CancellationToken, DropGuard};

use alphacast_core::Payload;

/// Per-channel send failure
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("send timed out")]
    TimedOut,
}

/// Where a broadcast payload is written for one viewer
///
/// The `#[async_trait]` macro keeps the trait object-safe so the registry can
/// store heterogeneous sinks as `Box<dyn FrameSink>`.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, payload: Payload) -> Result<(), SendError>;
}

/// Write half of an axum WebSocket
///
/// Dropping the sink cancels `released`, telling the connection handler that
/// holds the read half to drop the socket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
    _released: DropGuard,
}

impl WsSink {
    pub fn new(inner: SplitSink<WebSocket, Message>, released: CancellationToken) -> Self {
        Self {
            inner,
            _released: released.drop_guard(),
        }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, payload: Payload) -> Result<(), SendError> {
        self.inner
            .send(Message::Binary(payload.bytes()))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }
}
