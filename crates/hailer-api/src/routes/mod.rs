//! # API Route Modules
//!
//! - `sessions` — WebSocket upgrades for passenger and driver trip
//!   sessions and the location ingest stream.
//! - `feedback` — passenger rating of a finished trip.
//! - `state` — one-shot read of the passenger's current trip.

pub mod feedback;
pub mod sessions;
pub mod state;
