//! Connection handle and related types

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// A frame queued for a connection's writer task.
///
/// Text frames share their payload so a broadcast serializes once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Binary(Bytes),
}

impl OutboundFrame {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.as_ref().into()),
            Self::Binary(bytes) => Message::Binary(bytes),
        }
    }
}

/// The connection is closed or its writer has gone away.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Handle for a single live WebSocket connection.
///
/// Writes go through a bounded queue drained by the connection's writer
/// task; `close` signals that task to send a close frame and stop.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundFrame>,
    closed: watch::Sender<bool>,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<String>, sender: mpsc::Sender<OutboundFrame>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            connected_at: Utc::now(),
            sender,
            closed,
        }
    }

    /// Create a handle together with the receiving end of its outbound queue.
    pub fn channel(
        user_id: impl Into<String>,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Arc::new(Self::new(user_id, tx)), rx)
    }

    /// Queue a frame, waiting for space if the client is slow.
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), ConnectionClosed> {
        if self.is_closed() {
            return Err(ConnectionClosed);
        }
        self.sender.send(frame).await.map_err(|_| ConnectionClosed)
    }

    /// Signal the writer to close the socket. Never blocks; idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.sender.is_closed()
    }

    /// Receiver that observes `close`.
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
