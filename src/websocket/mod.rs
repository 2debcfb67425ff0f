//! WebSocket admission and per-connection lifecycle.

mod handler;
pub mod lifecycle;
mod message;

pub use handler::ws_handler;
pub use lifecycle::ReadExit;
pub use message::{Inbound, PING, PONG};
