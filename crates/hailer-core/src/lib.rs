//! # hailer-core — Foundational Types for the Dispatch Stack
//!
//! Defines the primitives every other `hailer-*` crate builds on. It depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `UserId`, `DriverId`, `TripId` wrap a UUID so
//!    a driver id can never be passed where a trip id is expected.
//!
//! 2. **One distance function.** [`geo::planar_distance_m`] is the cheap
//!    equirectangular approximation used for matching and fare estimates.
//!    It is not geodesic and is not meant to be.
//!
//! 3. **Integer money.** Fares and payments are whole cents (`i64`).
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod account;
pub mod error;
pub mod fare;
pub mod geo;
pub mod identity;

pub use account::User;
pub use error::CoreError;
pub use fare::{FareSchedule, RouteEstimate};
pub use geo::{planar_distance_m, Coordinate, Location, Place, EARTH_RADIUS_M};
pub use identity::{DriverId, TripId, UserId};
