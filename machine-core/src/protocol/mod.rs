//! Newline-framed ASCII protocol spoken with the solenoid controller.
//!
//! Outgoing messages are encoded into fixed-capacity lines, incoming bytes are
//! framed by [`LineFramer`] and decoded into [`IncomingEvent`]s.

pub mod framing;
pub mod incoming;
pub mod outgoing;

pub use framing::{FramingError, LineFramer};
pub use incoming::{ActuatorEcho, IncomingEvent, decode};
pub use outgoing::{EncodeError, OutgoingMessage, edge_prefix};

/// Longest line exchanged in either direction, terminator included.
pub const MAX_LINE_LEN: usize = 64;

/// Encoded outgoing line.
pub type WireLine = heapless::String<MAX_LINE_LEN>;
