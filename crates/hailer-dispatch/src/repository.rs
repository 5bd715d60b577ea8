//! # Repository Contracts
//!
//! Storage is an external collaborator. These traits are the only surface
//! the dispatch stack touches; the in-memory [`MemoryStore`](crate::MemoryStore)
//! implements them for development and tests.
//!
//! Updates take a closure that runs while the record is locked, so a
//! read-check-write sequence on one record is atomic.

use std::sync::Arc;

use hailer_core::{DriverId, Location, TripId, User, UserId};
use hailer_state::{Driver, DriverState, Trip};

use crate::cache::CachedLocationRepository;
use crate::error::RepositoryError;
use crate::memory::MemoryStore;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Mutation applied to a locked record.
pub type Mutation<'a, T> = &'a mut dyn FnMut(&mut T) -> RepoResult<()>;

/// Trip storage.
pub trait TripRepository: Send + Sync {
    fn get_trip(&self, id: TripId) -> RepoResult<Option<Trip>>;

    /// The oldest active trip with no driver.
    fn one_unassigned_trip(&self) -> RepoResult<Option<Trip>>;

    fn active_trip_for_user(&self, user_id: UserId) -> RepoResult<Option<Trip>>;

    fn active_trip_for_driver(&self, driver_id: DriverId) -> RepoResult<Option<Trip>>;

    /// Insert `trip` unless its passenger already has an active trip.
    fn insert_trip_for_user(&self, trip: Trip) -> RepoResult<Trip>;

    /// Run `mutate` on the stored trip and persist the result. If `mutate`
    /// fails the stored trip is left unchanged.
    fn update_trip(&self, id: TripId, mutate: Mutation<'_, Trip>) -> RepoResult<Trip>;
}

/// Driver storage.
pub trait DriverRepository: Send + Sync {
    fn get_driver(&self, id: DriverId) -> RepoResult<Option<Driver>>;

    /// Fetch every driver in `ids` that exists. Order is unspecified.
    fn drivers_by_ids(&self, ids: &[DriverId]) -> RepoResult<Vec<Driver>>;

    fn drivers_in_state(&self, state: DriverState) -> RepoResult<Vec<Driver>>;

    /// Fetch the driver, creating an off-shift record on first contact.
    fn ensure_driver(&self, id: DriverId) -> RepoResult<Driver>;

    fn set_driver_state(&self, id: DriverId, state: DriverState) -> RepoResult<Driver>;

    /// Move the driver to `new` only if it is currently in `expected`.
    /// Returns whether the swap happened.
    fn compare_and_set_driver_state(
        &self,
        id: DriverId,
        expected: DriverState,
        new: DriverState,
    ) -> RepoResult<bool>;

    fn update_driver(&self, id: DriverId, mutate: Mutation<'_, Driver>) -> RepoResult<Driver>;
}

/// Passenger storage.
pub trait UserRepository: Send + Sync {
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;

    /// Fetch the user, creating an empty account on first contact.
    fn ensure_user(&self, id: UserId) -> RepoResult<User>;

    fn update_user(&self, id: UserId, mutate: Mutation<'_, User>) -> RepoResult<User>;
}

/// Driver position history.
pub trait LocationRepository: Send + Sync {
    /// Append a sample. `location.driver_id` must be set.
    fn record_location(&self, location: Location) -> RepoResult<()>;

    /// The newest sample per driver.
    fn latest_locations(&self) -> RepoResult<Vec<Location>>;

    fn latest_location(&self, driver_id: DriverId) -> RepoResult<Option<Location>>;
}

/// The repository handles a process wires together.
#[derive(Clone)]
pub struct Repositories {
    pub trips: Arc<dyn TripRepository>,
    pub drivers: Arc<dyn DriverRepository>,
    pub users: Arc<dyn UserRepository>,
    pub locations: Arc<dyn LocationRepository>,
}

impl Repositories {
    /// All four contracts backed by one in-memory store, with the location
    /// cache in front of the position history.
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            trips: Arc::new(store.clone()),
            drivers: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            locations: Arc::new(CachedLocationRepository::new(store)),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
