//! # Trip Service
//!
//! The operations a session performs for its caller. Each call re-reads the
//! records it needs, applies one state-machine step inside the repository's
//! update closure, then carries out the step's effects: driver state,
//! aggregates on payment, and passenger notices.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use hailer_core::{DriverId, FareSchedule, Location, Place, TripId, User, UserId};
use hailer_protocol::Feedback;
use hailer_state::{Driver, Transition, Trip, TripEvent, TripState};

use crate::error::RepositoryError;
use crate::notifier::Notifier;
use crate::repository::{RepoResult, Repositories};

/// Trip lifecycle operations over the injected repositories.
#[derive(Clone)]
pub struct TripService {
    repos: Repositories,
    notifier: Arc<dyn Notifier>,
    fares: FareSchedule,
}

impl TripService {
    pub fn new(repos: Repositories, notifier: Arc<dyn Notifier>, fares: FareSchedule) -> Self {
        Self {
            repos,
            notifier,
            fares,
        }
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn fares(&self) -> &FareSchedule {
        &self.fares
    }

    // ─── Accounts ────────────────────────────────────────────────────

    pub fn ensure_user(&self, user_id: UserId) -> RepoResult<User> {
        self.repos.users.ensure_user(user_id)
    }

    pub fn ensure_driver(&self, driver_id: DriverId) -> RepoResult<Driver> {
        self.repos.drivers.ensure_driver(driver_id)
    }

    /// Start the driver's shift.
    pub fn punch_in(&self, driver_id: DriverId) -> RepoResult<Driver> {
        self.repos.drivers.ensure_driver(driver_id)?;
        let driver = self
            .repos
            .drivers
            .update_driver(driver_id, &mut |driver| Ok(driver.punch_in()?))?;
        info!(%driver_id, state = %driver.state, "driver punched in");
        Ok(driver)
    }

    /// End the driver's shift.
    pub fn punch_out(&self, driver_id: DriverId) -> RepoResult<Driver> {
        self.repos.drivers.ensure_driver(driver_id)?;
        let driver = self
            .repos
            .drivers
            .update_driver(driver_id, &mut |driver| Ok(driver.punch_out()?))?;
        info!(%driver_id, state = %driver.state, "driver punched out");
        Ok(driver)
    }

    // ─── Reads ───────────────────────────────────────────────────────

    pub fn trip(&self, trip_id: TripId) -> RepoResult<Option<Trip>> {
        self.repos.trips.get_trip(trip_id)
    }

    pub fn active_trip_for_user(&self, user_id: UserId) -> RepoResult<Option<Trip>> {
        self.repos.trips.active_trip_for_user(user_id)
    }

    pub fn active_trip_for_driver(&self, driver_id: DriverId) -> RepoResult<Option<Trip>> {
        self.repos.trips.active_trip_for_driver(driver_id)
    }

    pub fn driver_location(&self, driver_id: DriverId) -> RepoResult<Option<Location>> {
        self.repos.locations.latest_location(driver_id)
    }

    // ─── Passenger Operations ────────────────────────────────────────

    /// Create a `Requested` trip unless the passenger already has one.
    pub fn request_trip(&self, user_id: UserId, stops: Vec<Place>) -> RepoResult<Trip> {
        let trip = Trip::request(user_id, stops, &self.fares)?;
        let trip = self.repos.trips.insert_trip_for_user(trip)?;
        info!(
            trip_id = %trip.id,
            %user_id,
            stops = trip.stops.len(),
            estimated_cost_cents = trip.estimated_cost_cents,
            "trip requested"
        );
        counter!("hailer_trips_requested_total").increment(1);
        Ok(trip)
    }

    /// Cancel the passenger's active trip. `Ok(None)` if there is none.
    pub fn cancel_for_user(&self, user_id: UserId) -> RepoResult<Option<Trip>> {
        let Some(trip) = self.repos.trips.active_trip_for_user(user_id)? else {
            return Ok(None);
        };
        self.apply_event(trip.id, TripEvent::Cancel, None).map(Some)
    }

    /// Rate the driver of the passenger's own ended trip, once.
    pub fn provide_feedback(&self, user_id: UserId, feedback: &Feedback) -> RepoResult<Trip> {
        if !(1..=5).contains(&feedback.rating) {
            return Err(RepositoryError::InvalidArgument(format!(
                "rating must be between 1 and 5, got {}",
                feedback.rating
            )));
        }
        let trip = self.repos.trips.update_trip(feedback.trip_id, &mut |trip| {
            if trip.user_id != Some(user_id) {
                return Err(RepositoryError::Forbidden(
                    "trip belongs to another passenger".to_string(),
                ));
            }
            if trip.status != TripState::Ended {
                return Err(RepositoryError::Conflict(
                    "only ended trips can be rated".to_string(),
                ));
            }
            if trip.feedback_given {
                return Err(RepositoryError::Conflict(
                    "feedback already given for this trip".to_string(),
                ));
            }
            trip.feedback_given = true;
            Ok(())
        })?;
        if let Some(driver_id) = trip.driver_id {
            self.repos
                .drivers
                .update_driver(driver_id, &mut |driver| Ok(driver.record_rating(feedback.rating)?))?;
        }
        info!(trip_id = %trip.id, %user_id, rating = feedback.rating, "feedback recorded");
        Ok(trip)
    }

    // ─── Driver Operations ───────────────────────────────────────────

    /// Apply a lifecycle step to the driver's active trip.
    ///
    /// `payment_amount` is used by `ConfirmPayment`; when absent the
    /// estimated fare is recorded.
    pub fn driver_step(
        &self,
        driver_id: DriverId,
        event: TripEvent,
        payment_amount: Option<i64>,
    ) -> RepoResult<Trip> {
        let trip = self
            .repos
            .trips
            .active_trip_for_driver(driver_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "active trip for driver",
                id: driver_id.to_string(),
            })?;
        self.apply_event(trip.id, event, payment_amount)
    }

    /// Store a position sample from `driver_id`.
    pub fn record_location(&self, driver_id: DriverId, mut location: Location) -> RepoResult<()> {
        location
            .coordinate
            .validate()
            .map_err(|e| RepositoryError::InvalidArgument(e.to_string()))?;
        location.driver_id = Some(driver_id);
        self.repos.locations.record_location(location)
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn apply_event(
        &self,
        trip_id: TripId,
        event: TripEvent,
        payment_amount: Option<i64>,
    ) -> RepoResult<Trip> {
        let mut step = None;
        let trip = self.repos.trips.update_trip(trip_id, &mut |trip| {
            step = match event {
                TripEvent::ConfirmPayment => {
                    let amount = payment_amount.unwrap_or(trip.estimated_cost_cents);
                    trip.complete_with_payment(amount)?
                }
                _ => trip.apply(event)?,
            };
            Ok(())
        })?;

        match step {
            Some(step) => self.carry_out(&trip, step)?,
            None => debug!(%trip_id, status = %trip.status, %event, "event ignored in current state"),
        }
        Ok(trip)
    }

    fn carry_out(&self, trip: &Trip, step: Transition) -> RepoResult<()> {
        info!(trip_id = %trip.id, from = %step.from, to = %step.to, "trip transition");
        counter!("hailer_trip_transitions_total", "to" => step.to.to_string()).increment(1);

        if let (Some(driver_id), Some(state)) = (trip.driver_id, step.driver_state()) {
            self.repos.drivers.set_driver_state(driver_id, state)?;
        }

        if step.to == TripState::Ended {
            let paid = trip.actual_cost_cents.unwrap_or_default();
            if let Some(driver_id) = trip.driver_id {
                self.repos
                    .drivers
                    .update_driver(driver_id, &mut |driver| {
                        driver.record_completed_trip(paid);
                        Ok(())
                    })?;
            }
            if let Some(user_id) = trip.user_id {
                self.repos.users.ensure_user(user_id)?;
                self.repos.users.update_user(user_id, &mut |user| {
                    user.record_completed_trip(paid);
                    Ok(())
                })?;
            }
        }

        if let Some(user_id) = trip.user_id {
            for notice in step.notices() {
                self.notifier.notify(user_id, trip.id, notice);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TripService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripService")
            .field("fares", &self.fares)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ACTIVE_TRIP_EXISTS;
    use hailer_core::Coordinate;
    use hailer_state::{DriverState, Notice};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, _user_id: UserId, _trip_id: TripId, notice: Notice) {
            self.sent.lock().push(notice);
        }
    }

    fn service() -> (TripService, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = TripService::new(
            Repositories::in_memory(),
            notifier.clone(),
            FareSchedule::default(),
        );
        (service, notifier)
    }

    fn stops(count: usize) -> Vec<Place> {
        (0..count)
            .map(|i| Place::new("stop", Coordinate::new(30.0 + i as f64 * 0.02, 31.0).unwrap()))
            .collect()
    }

    /// A requested trip with an Available driver already attached.
    fn assigned(service: &TripService, stop_count: usize) -> (UserId, DriverId, Trip) {
        let user = UserId::new();
        let driver = DriverId::new();
        service.punch_in(driver).unwrap();
        let trip = service.request_trip(user, stops(stop_count)).unwrap();
        let repos = service.repositories();
        assert!(repos
            .drivers
            .compare_and_set_driver_state(driver, DriverState::Available, DriverState::Requested)
            .unwrap());
        let trip = repos
            .trips
            .update_trip(trip.id, &mut |t| Ok(t.assign_driver(driver)?))
            .unwrap();
        (user, driver, trip)
    }

    fn driver_state(service: &TripService, driver: DriverId) -> DriverState {
        service
            .repositories()
            .drivers
            .get_driver(driver)
            .unwrap()
            .unwrap()
            .state
    }

    #[test]
    fn duplicate_request_is_rejected_without_side_effects() {
        let (service, _) = service();
        let user = UserId::new();
        let first = service.request_trip(user, stops(2)).unwrap();
        let err = service.request_trip(user, stops(3)).unwrap_err();
        assert_eq!(err.to_string(), ACTIVE_TRIP_EXISTS);
        let active = service.active_trip_for_user(user).unwrap().unwrap();
        assert_eq!(active, first);
    }

    #[test]
    fn full_trip_updates_aggregates_and_notifies() {
        let (service, notifier) = service();
        let (user, driver, _) = assigned(&service, 3);

        for event in [TripEvent::Acknowledge, TripEvent::Accept] {
            service.driver_step(driver, event, None).unwrap();
        }
        assert_eq!(driver_state(&service, driver), DriverState::EnRoute);

        service.driver_step(driver, TripEvent::ArriveAtPickup, None).unwrap();
        service.driver_step(driver, TripEvent::Start, None).unwrap();
        assert_eq!(driver_state(&service, driver), DriverState::OnTrip);

        service.driver_step(driver, TripEvent::ArriveAtStop, None).unwrap();
        service.driver_step(driver, TripEvent::Continue, None).unwrap();
        service.driver_step(driver, TripEvent::ArriveAtDestination, None).unwrap();
        let ended = service
            .driver_step(driver, TripEvent::ConfirmPayment, Some(2_000))
            .unwrap();

        assert_eq!(ended.status, TripState::Ended);
        assert_eq!(ended.actual_cost_cents, Some(2_000));
        assert_eq!(driver_state(&service, driver), DriverState::Available);

        let repos = service.repositories();
        let d = repos.drivers.get_driver(driver).unwrap().unwrap();
        assert_eq!((d.trip_count, d.earnings_cents), (1, 2_000));
        let u = repos.users.get_user(user).unwrap().unwrap();
        assert_eq!((u.trip_count, u.spending_cents), (1, 2_000));

        assert_eq!(
            *notifier.sent.lock(),
            vec![
                Notice::DriverArrived,
                Notice::ArrivedAtDestination,
                Notice::TripEnded
            ]
        );
        assert!(service.active_trip_for_driver(driver).unwrap().is_none());
    }

    #[test]
    fn out_of_table_step_is_a_noop() {
        let (service, _) = service();
        let (_, driver, trip) = assigned(&service, 2);
        let after = service.driver_step(driver, TripEvent::Start, None).unwrap();
        assert_eq!(after.status, trip.status);
        assert_eq!(driver_state(&service, driver), DriverState::Requested);
    }

    #[test]
    fn step_without_trip_is_not_found() {
        let (service, _) = service();
        let driver = DriverId::new();
        service.punch_in(driver).unwrap();
        let err = service
            .driver_step(driver, TripEvent::Accept, None)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn passenger_cancel_releases_driver() {
        let (service, _) = service();
        let (user, driver, _) = assigned(&service, 2);
        service.driver_step(driver, TripEvent::Accept, None).unwrap();

        let canceled = service.cancel_for_user(user).unwrap().unwrap();
        assert_eq!(canceled.status, TripState::Canceled);
        assert!(canceled.canceled_at.is_some());
        assert_eq!(driver_state(&service, driver), DriverState::Available);
        assert!(service.cancel_for_user(user).unwrap().is_none());
    }

    #[test]
    fn punch_out_refused_mid_trip() {
        let (service, _) = service();
        let (_, driver, _) = assigned(&service, 2);
        let err = service.punch_out(driver).unwrap_err();
        assert!(matches!(err, RepositoryError::Driver(_)));
        assert_eq!(driver_state(&service, driver), DriverState::Requested);
    }

    fn ended_trip(service: &TripService) -> (UserId, DriverId, Trip) {
        let (user, driver, _) = assigned(service, 2);
        for event in [
            TripEvent::Accept,
            TripEvent::ArriveAtPickup,
            TripEvent::Start,
            TripEvent::ArriveAtDestination,
        ] {
            service.driver_step(driver, event, None).unwrap();
        }
        let trip = service
            .driver_step(driver, TripEvent::ConfirmPayment, None)
            .unwrap();
        (user, driver, trip)
    }

    #[test]
    fn feedback_once_on_own_ended_trip() {
        let (service, _) = service();
        let (user, driver, trip) = ended_trip(&service);
        assert_eq!(trip.actual_cost_cents, Some(trip.estimated_cost_cents));

        let feedback = Feedback {
            trip_id: trip.id,
            rating: 4,
            comment: Some("smooth".into()),
        };
        service.provide_feedback(user, &feedback).unwrap();
        let d = service.repositories().drivers.get_driver(driver).unwrap().unwrap();
        assert_eq!(d.rating_count, 1);
        assert!((d.rating - 4.0).abs() < f64::EPSILON);

        let again = service.provide_feedback(user, &feedback).unwrap_err();
        assert!(matches!(again, RepositoryError::Conflict(_)));

        let stranger = service.provide_feedback(UserId::new(), &feedback).unwrap_err();
        assert!(matches!(stranger, RepositoryError::Forbidden(_)));
    }

    #[test]
    fn feedback_rejects_active_trip_and_bad_rating() {
        let (service, _) = service();
        let (user, _, trip) = assigned(&service, 2);
        let mut feedback = Feedback {
            trip_id: trip.id,
            rating: 5,
            comment: None,
        };
        assert!(matches!(
            service.provide_feedback(user, &feedback),
            Err(RepositoryError::Conflict(_))
        ));
        feedback.rating = 9;
        assert!(matches!(
            service.provide_feedback(user, &feedback),
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn location_is_stamped_with_caller() {
        let (service, _) = service();
        let driver = DriverId::new();
        let sample = Location::at(Coordinate::new(30.0, 31.0).unwrap());
        service.record_location(driver, sample).unwrap();
        let stored = service.driver_location(driver).unwrap().unwrap();
        assert_eq!(stored.driver_id, Some(driver));
    }
}
