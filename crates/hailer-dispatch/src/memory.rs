//! # In-Memory Store
//!
//! Implements every repository contract over one set of tables behind a
//! single `RwLock`. Cross-table checks (one active trip per passenger) and
//! read-modify-write updates run under the write lock, so they are atomic
//! with respect to each other.
//!
//! Location history is append-only; the latest-per-driver view is computed
//! by scanning it. Put [`CachedLocationRepository`](crate::CachedLocationRepository)
//! in front when reads are frequent.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hailer_core::{DriverId, Location, TripId, User, UserId};
use hailer_state::{Driver, DriverState, Trip};

use crate::error::{RepositoryError, ACTIVE_TRIP_EXISTS};
use crate::repository::{
    DriverRepository, LocationRepository, Mutation, RepoResult, TripRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    trips: HashMap<TripId, Trip>,
    drivers: HashMap<DriverId, Driver>,
    users: HashMap<UserId, User>,
    locations: Vec<Location>,
}

/// Shared in-memory tables. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a driver record.
    pub fn put_driver(&self, driver: Driver) {
        self.tables.write().drivers.insert(driver.id, driver);
    }

    /// Number of stored trips.
    pub fn trip_count(&self) -> usize {
        self.tables.read().trips.len()
    }

    /// Snapshot of every stored trip.
    pub fn all_trips(&self) -> Vec<Trip> {
        self.tables.read().trips.values().cloned().collect()
    }

    /// Number of recorded location samples.
    pub fn location_history_len(&self) -> usize {
        self.tables.read().locations.len()
    }
}

/// Apply `mutate` to a scratch copy and store it only on success.
fn mutate_copy<T: Clone>(record: &mut T, mutate: Mutation<'_, T>) -> RepoResult<T> {
    let mut draft = record.clone();
    mutate(&mut draft)?;
    *record = draft.clone();
    Ok(draft)
}

impl TripRepository for MemoryStore {
    fn get_trip(&self, id: TripId) -> RepoResult<Option<Trip>> {
        Ok(self.tables.read().trips.get(&id).cloned())
    }

    fn one_unassigned_trip(&self) -> RepoResult<Option<Trip>> {
        Ok(self
            .tables
            .read()
            .trips
            .values()
            .filter(|trip| trip.is_unassigned())
            .min_by_key(|trip| (trip.created_at, trip.id))
            .cloned())
    }

    fn active_trip_for_user(&self, user_id: UserId) -> RepoResult<Option<Trip>> {
        Ok(self
            .tables
            .read()
            .trips
            .values()
            .find(|trip| trip.user_id == Some(user_id) && trip.status.is_active())
            .cloned())
    }

    fn active_trip_for_driver(&self, driver_id: DriverId) -> RepoResult<Option<Trip>> {
        Ok(self
            .tables
            .read()
            .trips
            .values()
            .find(|trip| trip.driver_id == Some(driver_id) && trip.status.is_active())
            .cloned())
    }

    fn insert_trip_for_user(&self, trip: Trip) -> RepoResult<Trip> {
        let mut tables = self.tables.write();
        if let Some(user_id) = trip.user_id {
            let busy = tables
                .trips
                .values()
                .any(|t| t.user_id == Some(user_id) && t.status.is_active());
            if busy {
                return Err(RepositoryError::Conflict(ACTIVE_TRIP_EXISTS.to_string()));
            }
        }
        if tables.trips.contains_key(&trip.id) {
            return Err(RepositoryError::Conflict(format!("trip {} already exists", trip.id)));
        }
        tables.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    fn update_trip(&self, id: TripId, mutate: Mutation<'_, Trip>) -> RepoResult<Trip> {
        let mut tables = self.tables.write();
        let trip = tables
            .trips
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("trip", id))?;
        mutate_copy(trip, mutate)
    }
}

impl DriverRepository for MemoryStore {
    fn get_driver(&self, id: DriverId) -> RepoResult<Option<Driver>> {
        Ok(self.tables.read().drivers.get(&id).cloned())
    }

    fn drivers_by_ids(&self, ids: &[DriverId]) -> RepoResult<Vec<Driver>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.drivers.get(id).cloned())
            .collect())
    }

    fn drivers_in_state(&self, state: DriverState) -> RepoResult<Vec<Driver>> {
        Ok(self
            .tables
            .read()
            .drivers
            .values()
            .filter(|driver| driver.state == state)
            .cloned()
            .collect())
    }

    fn ensure_driver(&self, id: DriverId) -> RepoResult<Driver> {
        let mut tables = self.tables.write();
        Ok(tables
            .drivers
            .entry(id)
            .or_insert_with(|| Driver::new(id))
            .clone())
    }

    fn set_driver_state(&self, id: DriverId, state: DriverState) -> RepoResult<Driver> {
        let mut tables = self.tables.write();
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("driver", id))?;
        driver.set_state(state);
        Ok(driver.clone())
    }

    fn compare_and_set_driver_state(
        &self,
        id: DriverId,
        expected: DriverState,
        new: DriverState,
    ) -> RepoResult<bool> {
        let mut tables = self.tables.write();
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("driver", id))?;
        if driver.state != expected {
            return Ok(false);
        }
        driver.set_state(new);
        Ok(true)
    }

    fn update_driver(&self, id: DriverId, mutate: Mutation<'_, Driver>) -> RepoResult<Driver> {
        let mut tables = self.tables.write();
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("driver", id))?;
        mutate_copy(driver, mutate)
    }
}

impl UserRepository for MemoryStore {
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    fn ensure_user(&self, id: UserId) -> RepoResult<User> {
        let mut tables = self.tables.write();
        Ok(tables
            .users
            .entry(id)
            .or_insert_with(|| User::new(id))
            .clone())
    }

    fn update_user(&self, id: UserId, mutate: Mutation<'_, User>) -> RepoResult<User> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("user", id))?;
        mutate_copy(user, mutate)
    }
}

impl LocationRepository for MemoryStore {
    fn record_location(&self, location: Location) -> RepoResult<()> {
        if location.driver_id.is_none() {
            return Err(RepositoryError::InvalidArgument(
                "location has no driver".to_string(),
            ));
        }
        self.tables.write().locations.push(location);
        Ok(())
    }

    fn latest_locations(&self) -> RepoResult<Vec<Location>> {
        let tables = self.tables.read();
        let mut latest: HashMap<DriverId, &Location> = HashMap::new();
        for location in &tables.locations {
            let Some(driver_id) = location.driver_id else {
                continue;
            };
            latest
                .entry(driver_id)
                .and_modify(|current| {
                    if location.timestamp >= current.timestamp {
                        *current = location;
                    }
                })
                .or_insert(location);
        }
        Ok(latest.into_values().cloned().collect())
    }

    fn latest_location(&self, driver_id: DriverId) -> RepoResult<Option<Location>> {
        Ok(self
            .tables
            .read()
            .locations
            .iter()
            .filter(|location| location.driver_id == Some(driver_id))
            .max_by_key(|location| location.timestamp)
            .cloned())
    }
}
