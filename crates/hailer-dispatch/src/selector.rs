//! # Driver Selector
//!
//! Picks the cheapest available driver for a trip.
//!
//! 1. Read the latest-location view (one sample per driver).
//! 2. Drop excluded drivers.
//! 3. Batch-fetch the remaining driver records and keep `Available` ones.
//! 4. Score each with the [`CostFunction`] and keep the minimum.
//!
//! Equal costs resolve to the lowest [`DriverId`], so the result does not
//! depend on the order the location view happens to return.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use hailer_core::{planar_distance_m, DriverId, Location};
use hailer_state::{DriverState, Trip};

use crate::error::DispatchError;
use crate::repository::{DriverRepository, LocationRepository};

/// Scores a candidate driver for a trip. Lower is better.
pub trait CostFunction: Send + Sync {
    /// `None` means the candidate cannot serve the trip at all.
    fn cost(&self, trip: &Trip, location: &Location) -> Option<f64>;
}

/// Planar distance in meters from the driver's last position to the pickup.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarDistanceCost;

impl CostFunction for PlanarDistanceCost {
    fn cost(&self, trip: &Trip, location: &Location) -> Option<f64> {
        trip.pickup()
            .map(|pickup| planar_distance_m(&pickup.coordinate, &location.coordinate))
    }
}

/// Nearest-driver matching over the location and driver repositories.
#[derive(Clone)]
pub struct DriverSelector {
    locations: Arc<dyn LocationRepository>,
    drivers: Arc<dyn DriverRepository>,
    cost: Arc<dyn CostFunction>,
}

impl DriverSelector {
    pub fn new(
        locations: Arc<dyn LocationRepository>,
        drivers: Arc<dyn DriverRepository>,
        cost: Arc<dyn CostFunction>,
    ) -> Self {
        Self {
            locations,
            drivers,
            cost,
        }
    }

    /// The cheapest `Available` driver not in `excluded`, or `None`.
    pub fn select_best_driver(
        &self,
        trip: &Trip,
        excluded: &HashSet<DriverId>,
    ) -> Result<Option<DriverId>, DispatchError> {
        if trip.pickup().is_none() {
            return Err(DispatchError::NoPickup(trip.id));
        }

        let candidates: Vec<(DriverId, Location)> = self
            .locations
            .latest_locations()?
            .into_iter()
            .filter_map(|location| location.driver_id.map(|id| (id, location)))
            .filter(|(id, _)| !excluded.contains(id))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let ids: Vec<DriverId> = candidates.iter().map(|(id, _)| *id).collect();
        let available: HashSet<DriverId> = self
            .drivers
            .drivers_by_ids(&ids)?
            .into_iter()
            .filter(|driver| driver.state == DriverState::Available)
            .map(|driver| driver.id)
            .collect();

        let best = candidates
            .iter()
            .filter(|(id, _)| available.contains(id))
            .filter_map(|(id, location)| {
                self.cost
                    .cost(trip, location)
                    .filter(|cost| !cost.is_nan())
                    .map(|cost| (cost, *id))
            })
            .min_by(|a, b| match a.0.total_cmp(&b.0) {
                Ordering::Equal => a.1.cmp(&b.1),
                other => other,
            });

        Ok(best.map(|(_, id)| id))
    }
}

impl std::fmt::Debug for DriverSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverSelector").finish_non_exhaustive()
    }
}
