//! # Trip Distributor
//!
//! The single background loop that turns unassigned trips into offers.
//!
//! Each tick takes the oldest unassigned trip, asks the selector for the
//! nearest available driver, claims that driver with a compare-and-set
//! `Available → Requested`, then attaches it to the trip. The distributor
//! does not notify anyone: the driver's own session notices the assignment
//! on its next poll.
//!
//! ## The write window
//!
//! The claim and the attach are two writes. If the attach fails (the trip
//! was canceled or picked up meanwhile) the driver is released straight
//! away. If the process dies between them, the driver is left `Requested`
//! with no trip; [`TripDistributor::reconcile`] releases such drivers once
//! they have been stuck longer than the grace period.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hailer_core::{DriverId, TripId};
use hailer_state::DriverState;

use crate::error::{DispatchError, RepositoryError};
use crate::repository::{DriverRepository, TripRepository};
use crate::selector::DriverSelector;

/// Timing for the distributor loop.
#[derive(Debug, Clone, Copy)]
pub struct DistributorConfig {
    /// Sleep between ticks when there is nothing to assign.
    pub poll_interval: Duration,
    /// Sleep after an unexpected error.
    pub error_backoff: Duration,
    /// How often to run the reconciliation sweep.
    pub reconcile_interval: Duration,
    /// How long a driver may sit in a busy state without a trip.
    pub reconcile_grace: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            error_backoff: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(30),
            reconcile_grace: Duration::from_secs(60),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No unassigned trip.
    Idle,
    /// The trip waits; no driver is available.
    NoDriver { trip_id: TripId },
    /// Another writer changed the chosen driver before the claim.
    DriverTaken { trip_id: TripId, driver_id: DriverId },
    /// The trip could not take the driver; the driver was released.
    AttachFailed { trip_id: TripId, driver_id: DriverId },
    Assigned { trip_id: TripId, driver_id: DriverId },
}

/// Assigns unassigned trips to drivers.
pub struct TripDistributor {
    trips: Arc<dyn TripRepository>,
    drivers: Arc<dyn DriverRepository>,
    selector: DriverSelector,
    config: DistributorConfig,
}

impl TripDistributor {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        drivers: Arc<dyn DriverRepository>,
        selector: DriverSelector,
        config: DistributorConfig,
    ) -> Self {
        Self {
            trips,
            drivers,
            selector,
            config,
        }
    }

    /// Try to assign the oldest unassigned trip.
    pub fn tick(&self) -> Result<TickOutcome, DispatchError> {
        let Some(trip) = self.trips.one_unassigned_trip()? else {
            return Ok(TickOutcome::Idle);
        };
        let trip_id = trip.id;

        let Some(driver_id) = self.selector.select_best_driver(&trip, &HashSet::new())? else {
            debug!(%trip_id, "no available driver");
            return Ok(TickOutcome::NoDriver { trip_id });
        };

        let claimed = self.drivers.compare_and_set_driver_state(
            driver_id,
            DriverState::Available,
            DriverState::Requested,
        )?;
        if !claimed {
            debug!(%trip_id, %driver_id, "driver changed state before claim");
            return Ok(TickOutcome::DriverTaken { trip_id, driver_id });
        }

        let attached = self
            .trips
            .update_trip(trip_id, &mut |trip| Ok(trip.assign_driver(driver_id)?));
        match attached {
            Ok(_) => {
                info!(%trip_id, %driver_id, "trip assigned");
                counter!("hailer_trips_assigned_total").increment(1);
                Ok(TickOutcome::Assigned { trip_id, driver_id })
            }
            Err(err) => {
                self.drivers.compare_and_set_driver_state(
                    driver_id,
                    DriverState::Requested,
                    DriverState::Available,
                )?;
                match err {
                    RepositoryError::Trip(_) | RepositoryError::NotFound { .. } => {
                        warn!(%trip_id, %driver_id, error = %err, "attach failed; driver released");
                        Ok(TickOutcome::AttachFailed { trip_id, driver_id })
                    }
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Release drivers stuck in a busy state with no active trip.
    ///
    /// Returns the released drivers.
    pub fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<DriverId>, DispatchError> {
        let grace = chrono::Duration::from_std(self.config.reconcile_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let mut released = Vec::new();
        for state in [DriverState::Requested, DriverState::EnRoute, DriverState::OnTrip] {
            for driver in self.drivers.drivers_in_state(state)? {
                if now - driver.state_changed_at < grace {
                    continue;
                }
                if self.trips.active_trip_for_driver(driver.id)?.is_some() {
                    continue;
                }
                if self
                    .drivers
                    .compare_and_set_driver_state(driver.id, state, DriverState::Available)?
                {
                    warn!(driver_id = %driver.id, %state, "released driver with no active trip");
                    counter!("hailer_drivers_reconciled_total").increment(1);
                    released.push(driver.id);
                }
            }
        }
        Ok(released)
    }

    /// Run until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "trip distributor started"
        );
        let mut next_reconcile = Instant::now() + self.config.reconcile_interval;

        loop {
            let delay = match self.tick() {
                Ok(TickOutcome::Assigned { .. }) | Ok(TickOutcome::AttachFailed { .. }) => {
                    Duration::ZERO
                }
                Ok(_) => self.config.poll_interval,
                Err(err) => {
                    error!(error = %err, "distributor tick failed");
                    counter!("hailer_distributor_errors_total").increment(1);
                    self.config.error_backoff
                }
            };

            if Instant::now() >= next_reconcile {
                if let Err(err) = self.reconcile(Utc::now()) {
                    error!(error = %err, "reconciliation sweep failed");
                }
                next_reconcile = Instant::now() + self.config.reconcile_interval;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("trip distributor stopped");
    }
}

impl std::fmt::Debug for TripDistributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripDistributor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
