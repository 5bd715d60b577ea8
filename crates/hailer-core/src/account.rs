//! # Passenger Accounts
//!
//! The passenger-side account record. Driver records carry a lifecycle state
//! and live in `hailer-state`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// A passenger account with contact details and aggregate stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Completed trips.
    pub trip_count: u32,
    /// Total paid across completed trips, in cents.
    pub spending_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an account with empty contact details and zeroed stats.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            phone: None,
            email: None,
            trip_count: 0,
            spending_cents: 0,
            created_at: Utc::now(),
        }
    }

    /// Fold a completed, paid trip into the aggregates.
    pub fn record_completed_trip(&mut self, paid_cents: i64) {
        self.trip_count += 1;
        self.spending_cents += paid_cents;
    }
}
