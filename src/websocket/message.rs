use axum::body::Bytes;
use axum::extract::ws::Message;

use crate::connection_manager::OutboundFrame;

/// Application-level liveness probe sent by clients
pub const PING: &str = "__ping__";
/// Reply to [`PING`]
pub const PONG: &str = "__pong__";

/// How the reader should react to an inbound frame
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Liveness probe; carries the reply in the same frame kind
    Ping(OutboundFrame),
    /// Peer started the close handshake
    Close,
    /// Anything else; the relay has no client-to-server protocol
    Ignored,
}

impl Inbound {
    pub fn classify(message: &Message) -> Self {
        match message {
            Message::Text(text) if text.as_str() == PING => {
                Inbound::Ping(OutboundFrame::text(PONG))
            }
            Message::Binary(bytes) if bytes.as_ref() == PING.as_bytes() => {
                Inbound::Ping(OutboundFrame::Binary(Bytes::from_static(PONG.as_bytes())))
            }
            Message::Close(_) => Inbound::Close,
            _ => Inbound::Ignored,
        }
    }
}
