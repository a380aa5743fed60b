//! WebSocket protocol layer
//!
//! One connection = one receive/dispatch loop. Handlers run to
//! completion before the next inbound frame is read, so frames within a
//! connection are never reordered.

pub mod dispatcher;
pub mod handlers;
pub mod protocol;

pub use dispatcher::{ws_handler, Connection, ConnectionMode};
pub use protocol::Envelope;
