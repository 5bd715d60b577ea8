//! # Error Types
//!
//! `RepositoryError` covers storage and business-rule failures surfaced to
//! a session as an `Error` packet. `DispatchError` wraps it for the
//! background distributor.

use thiserror::Error;

use hailer_state::{DriverError, TripError};

/// Text of the conflict returned when a passenger requests a second trip.
pub const ACTIVE_TRIP_EXISTS: &str = "User already has an active trip";

/// Errors from repositories and trip operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// No record with the given id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The write conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// The caller does not own the record.
    #[error("{0}")]
    Forbidden(String),

    /// The request is malformed.
    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Trip(#[from] TripError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors from the distributor loop.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    /// The cost function could not score any candidate for the trip.
    #[error("trip {0} has no pickup stop")]
    NoPickup(hailer_core::TripId),
}
