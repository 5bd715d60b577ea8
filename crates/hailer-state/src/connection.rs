//! # Connection State
//!
//! The lifecycle of one client-side duplex connection.
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected
//!      ▲               │              │
//!      │               ▼              ▼
//!      └──────── (terminal) ◀── Reconnecting ──▶ Connecting ...
//! ```

use serde::{Deserialize, Serialize};

/// Connection state owned by a single connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The stream is established.
    Connected,
    /// A transient failure occurred; waiting out the backoff delay.
    Reconnecting,
}

impl ConnectionState {
    /// Whether packets may be sent in this state.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
        };
        f.write_str(s)
    }
}
