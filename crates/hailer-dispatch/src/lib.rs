//! # hailer-dispatch — Matching and Trip Lifecycle
//!
//! Assigns requested trips to drivers and carries out the side effects of
//! trip transitions against the repositories.
//!
//! ## Components
//!
//! - **Repositories** (`repository.rs`): the storage contracts the rest of
//!   the stack consumes. [`MemoryStore`] implements all of them.
//! - **Location cache** (`cache.rs`): a write-through view of each driver's
//!   latest position, injected wherever fast reads are needed.
//! - **Selector** (`selector.rs`): nearest available driver under a
//!   pluggable [`CostFunction`].
//! - **Distributor** (`distributor.rs`): the single background loop that
//!   pulls unassigned trips and assigns them.
//! - **Trip service** (`service.rs`): the operations sessions invoke on
//!   behalf of passengers and drivers.
//!
//! ## Consistency
//!
//! Every operation re-reads the records it touches. Nothing holds a trip or
//! driver across calls, so concurrent sessions never act on a stale copy.
//! A driver is claimed with a compare-and-set on its state, which is what
//! keeps the distributor from assigning one driver to two trips.

pub mod cache;
pub mod distributor;
pub mod error;
pub mod memory;
pub mod notifier;
pub mod repository;
pub mod selector;
pub mod service;

pub use cache::CachedLocationRepository;
pub use distributor::{DistributorConfig, TickOutcome, TripDistributor};
pub use error::{DispatchError, RepositoryError};
pub use memory::MemoryStore;
pub use notifier::{LogNotifier, Notifier};
pub use repository::{
    DriverRepository, LocationRepository, Repositories, TripRepository, UserRepository,
};
pub use selector::{CostFunction, DriverSelector, PlanarDistanceCost};
pub use service::TripService;
