//! Registry of live WebSocket connections, one per user identity.

mod registry;
mod types;

pub use registry::ConnectionRegistry;
pub use types::{ConnectionClosed, ConnectionHandle, OutboundFrame};
