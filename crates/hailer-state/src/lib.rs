//! # hailer-state — Lifecycle State Machines
//!
//! Pure rules for the entities whose state the dispatch stack synchronizes.
//! Nothing here performs I/O; repositories persist the records and sessions
//! relay them.
//!
//! ## State Machines
//!
//! - **Trip** (`trip.rs`): `Unspecified → Requested → Acknowledged →
//!   Accepted → DriverArrived → Ongoing ⇄ AtStop → Arrived → Ended`, with
//!   `Canceled` reachable from any non-terminal state. [`transition`] is a
//!   total function over `(TripState, TripEvent)`; pairs outside the table
//!   yield `None`.
//!
//! - **Driver** (`driver.rs`): availability states and the shift rules for
//!   punching in and out, plus the driver's aggregate stats.
//!
//! - **Connection** (`connection.rs`): the four client connection states
//!   broadcast by a connection manager.
//!
//! ## Design
//!
//! Trip states use an enum with a static transition table rather than
//! typestate types. A trip's state arrives from storage at runtime on every
//! poll tick, so the table has to be evaluated at runtime anyway.

pub mod connection;
pub mod driver;
pub mod trip;

pub use connection::ConnectionState;
pub use driver::{Driver, DriverError, DriverState};
pub use trip::{
    transition, Notice, Transition, Trip, TripEffect, TripError, TripEvent, TripState,
};
