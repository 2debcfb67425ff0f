//! Per-connection worker: a reader task, a writer task, and guaranteed cleanup.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry, OutboundFrame};

use super::message::Inbound;

/// How long the writer gets to send a close frame once the reader is done
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Why the reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadExit {
    /// Close frame or end of stream
    PeerClosed,
    ReadError,
    /// The handle was closed, so replies can no longer be queued
    HandleClosed,
}

/// Deregisters the connection when dropped, whatever ended it.
struct Deregistration {
    handle: Arc<ConnectionHandle>,
    registry: Arc<ConnectionRegistry>,
    tasks: Vec<AbortHandle>,
}

impl Drop for Deregistration {
    fn drop(&mut self) {
        self.handle.close();
        for task in &self.tasks {
            task.abort();
        }
        self.registry
            .revoke_connection(&self.handle.user_id, self.handle.id);

        let duration_ms = (Utc::now() - self.handle.connected_at).num_milliseconds();
        tracing::info!(
            connection_id = %self.handle.id,
            user_id = %self.handle.user_id,
            duration_ms = duration_ms,
            "WebSocket connection closed"
        );
    }
}

/// Drive an admitted connection until either side ends it.
#[tracing::instrument(
    name = "ws.connection",
    skip_all,
    fields(connection_id = %handle.id, user_id = %handle.user_id)
)]
pub async fn run(
    socket: WebSocket,
    handle: Arc<ConnectionHandle>,
    outbound: mpsc::Receiver<OutboundFrame>,
    registry: Arc<ConnectionRegistry>,
) {
    let (sink, stream) = socket.split();

    let mut write_task = tokio::spawn(write_loop(sink, outbound, handle.close_signal()));
    let mut read_task = tokio::spawn(read_loop(stream, handle.clone()));

    let guard = Deregistration {
        handle,
        registry,
        tasks: vec![write_task.abort_handle(), read_task.abort_handle()],
    };

    tokio::select! {
        _ = &mut write_task => {
            tracing::debug!("Writer finished");
        }
        exit = &mut read_task => {
            tracing::debug!(exit = ?exit.ok(), "Reader finished");
            // Writer answers with a close frame before the guard aborts it
            guard.handle.close();
            if tokio::time::timeout(CLOSE_GRACE, &mut write_task).await.is_err() {
                tracing::debug!("Writer did not finish the close handshake in time");
            }
        }
    }
}

/// Read frames in order, answering liveness probes. Never touches the registry.
pub async fn read_loop<S, E>(mut stream: S, handle: Arc<ConnectionHandle>) -> ReadExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(connection_id = %handle.id, error = %e, "WebSocket read error");
                return ReadExit::ReadError;
            }
        };

        match Inbound::classify(&message) {
            Inbound::Ping(reply) => {
                if handle.send(reply).await.is_err() {
                    return ReadExit::HandleClosed;
                }
            }
            Inbound::Close => {
                tracing::debug!(connection_id = %handle.id, "Client closed connection");
                return ReadExit::PeerClosed;
            }
            Inbound::Ignored => {}
        }
    }

    tracing::debug!(connection_id = %handle.id, "WebSocket stream ended");
    ReadExit::PeerClosed
}

/// Drain queued frames into the socket until closed.
///
/// A close signal sends a close frame first so the peer sees a clean shutdown.
pub async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    mut close: watch::Receiver<bool>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        if *close.borrow_and_update() {
            let _ = sink.send(Message::Close(None)).await;
            break;
        }

        tokio::select! {
            biased;

            changed = close.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                // A stalled peer must not keep a closed connection alive
                tokio::select! {
                    biased;

                    _ = close.wait_for(|closed| *closed) => {
                        tracing::debug!("Closed while a write was pending");
                        break;
                    }
                    sent = sink.send(frame.into_message()) => {
                        if let Err(e) = sent {
                            tracing::warn!(error = %e, "WebSocket write error");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::message::{PING, PONG};
    use axum::body::Bytes;
    use futures::stream;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn frames(messages: Vec<Result<Message, io::Error>>) -> impl Stream<Item = Result<Message, io::Error>> + Unpin {
        stream::iter(messages)
    }

    #[tokio::test]
    async fn test_ping_gets_pong_in_same_kind() {
        let (handle, mut rx) = ConnectionHandle::channel("alice", 4);
        let input = frames(vec![
            Ok(Message::Text(PING.into())),
            Ok(Message::Binary(Bytes::from_static(PING.as_bytes()))),
            Ok(Message::Text("hello".into())),
        ]);

        assert_eq!(read_loop(input, handle).await, ReadExit::PeerClosed);
        assert_eq!(rx.recv().await, Some(OutboundFrame::text(PONG)));
        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Binary(Bytes::from_static(PONG.as_bytes())))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ping_does_not_touch_registry() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::channel("alice", 4);
        registry.admit(handle.clone());

        let input = frames(vec![Ok(Message::Text(PING.into()))]);
        read_loop(input, handle.clone()).await;

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.lookup("alice").unwrap().id, handle.id);
    }

    #[tokio::test]
    async fn test_close_frame_stops_reading() {
        let (handle, mut rx) = ConnectionHandle::channel("alice", 4);
        let input = frames(vec![
            Ok(Message::Close(None)),
            Ok(Message::Text(PING.into())),
        ]);

        assert_eq!(read_loop(input, handle).await, ReadExit::PeerClosed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_error_stops_reading() {
        let (handle, _rx) = ConnectionHandle::channel("alice", 4);
        let input = frames(vec![Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))]);

        assert_eq!(read_loop(input, handle).await, ReadExit::ReadError);
    }

    #[tokio::test]
    async fn test_writer_forwards_frames_in_order() {
        let (handle, rx) = ConnectionHandle::channel("alice", 4);
        let (sink, mut written) = futures::channel::mpsc::unbounded::<Message>();

        let writer = tokio::spawn(write_loop(sink, rx, handle.close_signal()));
        handle.send(OutboundFrame::text("one")).await.unwrap();
        handle.send(OutboundFrame::text("two")).await.unwrap();

        assert_eq!(written.next().await, Some(Message::Text("one".into())));
        assert_eq!(written.next().await, Some(Message::Text("two".into())));

        handle.close();
        writer.await.unwrap();
        assert_eq!(written.next().await, Some(Message::Close(None)));
        assert_eq!(written.next().await, None);
    }

    #[tokio::test]
    async fn test_writer_closes_when_already_signalled() {
        let (handle, rx) = ConnectionHandle::channel("alice", 4);
        let (sink, mut written) = futures::channel::mpsc::unbounded::<Message>();
        handle.close();

        write_loop(sink, rx, handle.close_signal()).await;
        assert_eq!(written.next().await, Some(Message::Close(None)));
    }

    /// Accepts frames but never finishes flushing them, like a peer that stopped reading.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = io::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_writer_stops_on_close_while_peer_is_stalled() {
        let (handle, rx) = ConnectionHandle::channel("alice", 4);
        let writer = tokio::spawn(write_loop(StalledSink, rx, handle.close_signal()));

        handle.send(OutboundFrame::text("stuck")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        handle.close();
        let finished = tokio::time::timeout(Duration::from_secs(2), writer).await;
        assert!(finished.is_ok(), "writer kept waiting on a stalled peer after close");
    }

    #[tokio::test]
    async fn test_guard_revokes_only_its_own_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (old, _old_rx) = ConnectionHandle::channel("alice", 4);
        let (new, _new_rx) = ConnectionHandle::channel("alice", 4);
        registry.admit(old.clone());
        registry.admit(new.clone());

        drop(Deregistration {
            handle: old.clone(),
            registry: registry.clone(),
            tasks: Vec::new(),
        });
        assert_eq!(registry.lookup("alice").unwrap().id, new.id);

        drop(Deregistration {
            handle: new.clone(),
            registry: registry.clone(),
            tasks: Vec::new(),
        });
        assert!(registry.lookup("alice").is_none());
        assert!(new.is_closed());
    }
}
