//! # hailer-client — Passenger and Driver Connections
//!
//! Keeps one duplex trip session open against the dispatch server and
//! turns inbound packets into typed [`ClientEvent`]s.
//!
//! ## Components
//!
//! - **Transport** (`transport.rs`): the [`Connector`] seam and the
//!   WebSocket implementation, with failures classified by [`FailureCode`].
//! - **Backoff** (`backoff.rs`): capped exponential delay with jitter.
//! - **Connection manager** (`manager.rs`): the reconnecting session loop,
//!   the outbound drop-oldest queue, and the cached current trip.
//! - **Location reporter** (`location.rs`): sends only the newest position
//!   on a fixed interval.
//!
//! ## Connection states
//!
//! ```text
//! Disconnected ─connect()─► Connecting ─► Connected
//!                               │             │ transient failure
//!                               │             ▼
//!                               │        Reconnecting ─► Connected
//!                               │             │
//!                               └─terminal────┴──► Disconnected
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod location;
pub mod manager;
pub mod transport;

pub use backoff::Backoff;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, FailureCode, TransportError};
pub use location::LocationReporter;
pub use manager::{ClientEvent, ClientPacket, ConnectionManager, DriverClient, UserClient};
pub use transport::{Connection, Connector, WsConnector};
