//! # Driver Lifecycle
//!
//! Availability states for a driver and the shift rules around them.
//!
//! ```text
//! Offline/Inactive ──PunchIn──▶ Available ──(distributor)──▶ Requested
//!        ▲                         │  ▲                          │
//!        └────────PunchOut─────────┘  └── trip ends/cancels ── EnRoute ──▶ OnTrip
//! ```
//!
//! Only the distributor (on assignment), the reconciliation sweep, and the
//! driver's own packets change a driver's state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hailer_core::DriverId;

/// Availability state of a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    #[default]
    Unspecified,
    /// Off shift.
    Offline,
    /// On shift but not taking trips.
    Inactive,
    /// Eligible for assignment.
    Available,
    /// Offered a trip by the distributor.
    Requested,
    /// Driving to the pickup.
    EnRoute,
    /// Carrying a passenger.
    OnTrip,
    /// Account removed.
    Deleted,
}

impl DriverState {
    /// Whether the driver is attached to a trip in this state.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Requested | Self::EnRoute | Self::OnTrip)
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Offline => "OFFLINE",
            Self::Inactive => "INACTIVE",
            Self::Available => "AVAILABLE",
            Self::Requested => "REQUESTED",
            Self::EnRoute => "EN_ROUTE",
            Self::OnTrip => "ON_TRIP",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// Errors from driver shift changes and ratings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("cannot punch in while {0}")]
    CannotPunchIn(DriverState),

    #[error("cannot punch out while {0}")]
    CannotPunchOut(DriverState),

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
}

/// A driver account with availability and aggregate stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub phone: Option<String>,
    pub state: DriverState,
    /// When `state` last changed.
    pub state_changed_at: DateTime<Utc>,
    pub trip_count: u32,
    /// Running mean of passenger ratings, 0 until the first rating.
    pub rating: f64,
    pub rating_count: u32,
    pub earnings_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    /// A new, off-shift driver.
    pub fn new(id: DriverId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: String::new(),
            phone: None,
            state: DriverState::Offline,
            state_changed_at: now,
            trip_count: 0,
            rating: 0.0,
            rating_count: 0,
            earnings_cents: 0,
            created_at: now,
        }
    }

    /// Set the state, stamping `state_changed_at` if it differs.
    pub fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            self.state = state;
            self.state_changed_at = Utc::now();
        }
    }

    /// Start a shift.
    pub fn punch_in(&mut self) -> Result<(), DriverError> {
        match self.state {
            DriverState::Unspecified | DriverState::Offline | DriverState::Inactive => {
                self.set_state(DriverState::Available);
                Ok(())
            }
            DriverState::Available => Ok(()),
            other => Err(DriverError::CannotPunchIn(other)),
        }
    }

    /// End a shift. Refused while attached to a trip.
    pub fn punch_out(&mut self) -> Result<(), DriverError> {
        match self.state {
            DriverState::Available | DriverState::Inactive | DriverState::Offline => {
                self.set_state(DriverState::Offline);
                Ok(())
            }
            other => Err(DriverError::CannotPunchOut(other)),
        }
    }

    /// Fold a rating of 1..=5 into the running average.
    pub fn record_rating(&mut self, rating: u8) -> Result<(), DriverError> {
        if !(1..=5).contains(&rating) {
            return Err(DriverError::InvalidRating(rating));
        }
        let total = self.rating * f64::from(self.rating_count) + f64::from(rating);
        self.rating_count += 1;
        self.rating = total / f64::from(self.rating_count);
        Ok(())
    }

    /// Fold a completed, paid trip into the aggregates.
    pub fn record_completed_trip(&mut self, earned_cents: i64) {
        self.trip_count += 1;
        self.earnings_cents += earned_cents;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_in_then_out() {
        let mut driver = Driver::new(DriverId::new());
        assert_eq!(driver.state, DriverState::Offline);
        driver.punch_in().unwrap();
        assert_eq!(driver.state, DriverState::Available);
        driver.punch_out().unwrap();
        assert_eq!(driver.state, DriverState::Offline);
    }

    #[test]
    fn punch_out_refused_on_trip() {
        let mut driver = Driver::new(DriverId::new());
        for state in [DriverState::Requested, DriverState::EnRoute, DriverState::OnTrip] {
            driver.state = state;
            assert_eq!(driver.punch_out(), Err(DriverError::CannotPunchOut(state)));
            assert_eq!(driver.state, state);
        }
    }

    #[test]
    fn deleted_driver_cannot_punch_in() {
        let mut driver = Driver::new(DriverId::new());
        driver.state = DriverState::Deleted;
        assert!(driver.punch_in().is_err());
    }

    #[test]
    fn rating_is_running_mean() {
        let mut driver = Driver::new(DriverId::new());
        driver.record_rating(5).unwrap();
        driver.record_rating(4).unwrap();
        driver.record_rating(3).unwrap();
        assert_eq!(driver.rating_count, 3);
        assert!((driver.rating - 4.0).abs() < f64::EPSILON);
        assert_eq!(driver.record_rating(0), Err(DriverError::InvalidRating(0)));
        assert_eq!(driver.record_rating(6), Err(DriverError::InvalidRating(6)));
    }

    #[test]
    fn set_state_stamps_only_on_change() {
        let mut driver = Driver::new(DriverId::new());
        let stamped = driver.state_changed_at;
        driver.set_state(DriverState::Offline);
        assert_eq!(driver.state_changed_at, stamped);
    }
}
