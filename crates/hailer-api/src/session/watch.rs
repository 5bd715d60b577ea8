//! Diff of the caller's active trip against what this session last sent.

use hailer_core::TripId;
use hailer_dispatch::repository::RepoResult;
use hailer_state::{Trip, TripState};

/// One thing the session should tell its client.
#[derive(Debug, Clone, PartialEq)]
pub enum TripChange {
    /// A trip not seen before, or a new status on the watched trip.
    Updated {
        trip: Trip,
        /// The same trip was already being watched, so this is a
        /// transition the session saw happen rather than a first sight.
        transitioned: bool,
    },
    /// The caller no longer has an active trip.
    Cleared,
}

/// The last `(trip, status)` pair communicated on one session.
///
/// Owned by the session's poll task.
#[derive(Debug, Default)]
pub struct TripWatch {
    last: Option<(TripId, TripState)>,
}

impl TripWatch {
    /// The trip id last communicated, if any.
    pub fn trip_id(&self) -> Option<TripId> {
        self.last.map(|(id, _)| id)
    }

    /// Compare `current` with the last communicated state.
    ///
    /// When the watched trip has left the active set, `lookup` fetches it so
    /// its terminal status can be sent before [`TripChange::Cleared`].
    /// Polling with no change yields nothing.
    pub fn observe(
        &mut self,
        current: Option<&Trip>,
        lookup: impl FnOnce(TripId) -> RepoResult<Option<Trip>>,
    ) -> RepoResult<Vec<TripChange>> {
        let mut changes = Vec::new();

        match (self.last, current) {
            (Some((id, status)), Some(trip)) if id == trip.id && status == trip.status => {}
            (Some((id, _)), Some(trip)) if id == trip.id => {
                changes.push(TripChange::Updated {
                    trip: trip.clone(),
                    transitioned: true,
                });
            }
            (last, Some(trip)) => {
                if let Some((id, status)) = last {
                    changes.extend(terminal_snapshot(id, status, lookup)?);
                }
                changes.push(TripChange::Updated {
                    trip: trip.clone(),
                    transitioned: false,
                });
            }
            (Some((id, status)), None) => {
                changes.extend(terminal_snapshot(id, status, lookup)?);
                changes.push(TripChange::Cleared);
            }
            (None, None) => {}
        }

        self.last = current.map(|trip| (trip.id, trip.status));
        Ok(changes)
    }
}

fn terminal_snapshot(
    id: TripId,
    sent: TripState,
    lookup: impl FnOnce(TripId) -> RepoResult<Option<Trip>>,
) -> RepoResult<Option<TripChange>> {
    Ok(lookup(id)?
        .filter(|trip| trip.status != sent && trip.status.is_terminal())
        .map(|trip| TripChange::Updated {
            trip,
            transitioned: true,
        }))
}
