//! # hailer-protocol — Session Wire Format
//!
//! Everything that crosses a duplex session: the packet unions for each
//! session flavour, the JSON envelope that stamps them, and the bounded
//! queue both ends use to buffer outbound packets.
//!
//! ## Framing
//!
//! Each WebSocket text frame holds one JSON object:
//!
//! ```text
//! {"type": "status_update", "trip": {...}, "timestamp": "2026-01-01T00:00:00Z"}
//! ```
//!
//! `type` selects the variant. A `type` the receiver does not know decodes
//! to the `Unknown` variant so the caller can choose to drop it or reply
//! with an error instead of failing the whole session.

pub mod codec;
pub mod error;
pub mod packet;
pub mod queue;

pub use codec::Envelope;
pub use error::ProtocolError;
pub use packet::{DriverPacket, Feedback, LocationPacket, Packet, SessionPacket, UserPacket};
pub use queue::{DropOldestQueue, QueueClosed};
