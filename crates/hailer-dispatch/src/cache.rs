//! # Latest-Location Cache
//!
//! Write-through cache of each driver's newest position, layered over any
//! [`LocationRepository`]. The selector reads the latest view every
//! distributor tick and the passenger poller reads it every session tick;
//! both hit this map instead of scanning history.
//!
//! The cache hydrates from the inner repository on first read. Writes go to
//! the inner repository first and only reach the map once stored.

use std::collections::HashMap;

use parking_lot::RwLock;

use hailer_core::{DriverId, Location};

use crate::repository::{LocationRepository, RepoResult};

#[derive(Debug, Default)]
struct CacheState {
    hydrated: bool,
    latest: HashMap<DriverId, Location>,
}

/// A [`LocationRepository`] decorator holding the latest sample per driver.
#[derive(Debug)]
pub struct CachedLocationRepository<R> {
    inner: R,
    state: RwLock<CacheState>,
}

impl<R: LocationRepository> CachedLocationRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Drop cached entries; the next read hydrates again.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.latest.clear();
        state.hydrated = false;
    }

    fn hydrate(&self) -> RepoResult<()> {
        if self.state.read().hydrated {
            return Ok(());
        }
        let loaded = self.inner.latest_locations()?;
        let mut state = self.state.write();
        if !state.hydrated {
            for location in loaded {
                if let Some(driver_id) = location.driver_id {
                    upsert_newer(&mut state.latest, driver_id, location);
                }
            }
            state.hydrated = true;
        }
        Ok(())
    }
}

fn upsert_newer(latest: &mut HashMap<DriverId, Location>, driver_id: DriverId, location: Location) {
    match latest.get(&driver_id) {
        Some(current) if current.timestamp > location.timestamp => {}
        _ => {
            latest.insert(driver_id, location);
        }
    }
}

impl<R: LocationRepository> LocationRepository for CachedLocationRepository<R> {
    fn record_location(&self, location: Location) -> RepoResult<()> {
        self.inner.record_location(location.clone())?;
        if let Some(driver_id) = location.driver_id {
            upsert_newer(&mut self.state.write().latest, driver_id, location);
        }
        Ok(())
    }

    fn latest_locations(&self) -> RepoResult<Vec<Location>> {
        self.hydrate()?;
        Ok(self.state.read().latest.values().cloned().collect())
    }

    fn latest_location(&self, driver_id: DriverId) -> RepoResult<Option<Location>> {
        self.hydrate()?;
        Ok(self.state.read().latest.get(&driver_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use hailer_core::Coordinate;

    fn sample(driver: DriverId, lat: f64, age_secs: i64) -> Location {
        let mut location = Location::at(Coordinate::new(lat, 31.0).unwrap());
        location.driver_id = Some(driver);
        location.timestamp -= chrono::Duration::seconds(age_secs);
        location
    }

    #[test]
    fn hydrates_from_existing_history() {
        let store = MemoryStore::new();
        let driver = DriverId::new();
        store.record_location(sample(driver, 30.0, 5)).unwrap();

        let cache = CachedLocationRepository::new(store);
        let latest = cache.latest_location(driver).unwrap().unwrap();
        assert_eq!(latest.coordinate.latitude, 30.0);
    }

    #[test]
    fn writes_through_to_inner() {
        let store = MemoryStore::new();
        let cache = CachedLocationRepository::new(store.clone());
        let driver = DriverId::new();
        cache.record_location(sample(driver, 30.0, 0)).unwrap();
        assert_eq!(store.location_history_len(), 1);
        assert_eq!(cache.latest_locations().unwrap().len(), 1);
    }

    #[test]
    fn stale_sample_does_not_replace_newer() {
        let cache = CachedLocationRepository::new(MemoryStore::new());
        let driver = DriverId::new();
        cache.record_location(sample(driver, 30.2, 0)).unwrap();
        cache.record_location(sample(driver, 30.1, 60)).unwrap();
        let latest = cache.latest_location(driver).unwrap().unwrap();
        assert_eq!(latest.coordinate.latitude, 30.2);
    }

    #[test]
    fn failed_write_is_not_cached() {
        let cache = CachedLocationRepository::new(MemoryStore::new());
        let anonymous = Location::at(Coordinate::new(30.0, 31.0).unwrap());
        assert!(cache.record_location(anonymous).is_err());
        assert!(cache.latest_locations().unwrap().is_empty());
    }

    #[test]
    fn invalidate_rehydrates() {
        let store = MemoryStore::new();
        let cache = CachedLocationRepository::new(store.clone());
        assert!(cache.latest_locations().unwrap().is_empty());
        let driver = DriverId::new();
        // Written behind the cache's back.
        store.record_location(sample(driver, 30.0, 0)).unwrap();
        assert!(cache.latest_location(driver).unwrap().is_none());
        cache.invalidate();
        assert!(cache.latest_location(driver).unwrap().is_some());
    }
}
