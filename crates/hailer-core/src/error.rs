//! # Error Types
//!
//! Validation failures for the foundational types. Higher layers wrap these
//! in their own `thiserror` enums.

use thiserror::Error;

/// Error raised when constructing or validating a core type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Latitude outside `[-90, 90]` or longitude outside `[-180, 180]`.
    #[error("coordinate out of range: lat={latitude}, lon={longitude}")]
    CoordinateOutOfRange {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },

    /// An identifier string could not be parsed.
    #[error("invalid {kind} identifier: {value}")]
    InvalidIdentifier {
        /// Identifier namespace (e.g. "driver").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A fare schedule parameter is negative or otherwise unusable.
    #[error("invalid fare schedule: {0}")]
    InvalidFare(String),
}
