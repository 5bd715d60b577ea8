//! # Trip Lifecycle State Machine
//!
//! Models a single ride from request to payment.
//!
//! ## States
//!
//! ```text
//! Unspecified ──▶ Requested ──▶ Acknowledged ──▶ Accepted ──▶ DriverArrived
//!                     │                             ▲               │
//!                     └─────────────────────────────┘               ▼
//!                                          AtStop ◀──────────▶ Ongoing
//!                                                                   │
//!                                                                   ▼
//!                                                Ended ◀──────── Arrived
//!
//! Canceled is reachable from every active state.
//! ```
//!
//! ## Totality
//!
//! [`transition`] is defined for every `(TripState, TripEvent)` pair. Pairs
//! outside the table return `None` and the caller treats them as a no-op.
//! Once a trip is `Ended` or `Canceled` no event changes it.
//!
//! ## Stops
//!
//! `stops[0]` is the pickup and the last element is the dropoff. `next_stop`
//! indexes the stop the driver is heading to and advances exactly once on
//! each transition carrying [`TripEffect::AdvanceStop`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hailer_core::{CoreError, DriverId, FareSchedule, Place, TripId, UserId};

use crate::driver::DriverState;

// ─── Trip State ──────────────────────────────────────────────────────

/// Lifecycle state of a trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripState {
    /// Constructed but not yet requested.
    #[default]
    Unspecified,
    /// Waiting for a driver.
    Requested,
    /// The assigned driver's device has received the offer.
    Acknowledged,
    /// The driver accepted and is heading to the pickup.
    Accepted,
    /// The driver is waiting at the pickup.
    DriverArrived,
    /// The passenger is on board and moving.
    Ongoing,
    /// Stopped at an intermediate stop.
    AtStop,
    /// Reached the dropoff, awaiting payment.
    Arrived,
    /// Paid and closed (terminal).
    Ended,
    /// Abandoned by either side (terminal).
    Canceled,
}

impl TripState {
    /// Every state, in lifecycle order.
    pub const ALL: [TripState; 10] = [
        Self::Unspecified,
        Self::Requested,
        Self::Acknowledged,
        Self::Accepted,
        Self::DriverArrived,
        Self::Ongoing,
        Self::AtStop,
        Self::Arrived,
        Self::Ended,
        Self::Canceled,
    ];

    /// Whether the trip is in progress (neither unrequested nor finished).
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Unspecified | Self::Ended | Self::Canceled)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Canceled)
    }
}

impl std::fmt::Display for TripState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Requested => "REQUESTED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Accepted => "ACCEPTED",
            Self::DriverArrived => "DRIVER_ARRIVED",
            Self::Ongoing => "ONGOING",
            Self::AtStop => "AT_STOP",
            Self::Arrived => "ARRIVED",
            Self::Ended => "ENDED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

// ─── Events and Effects ──────────────────────────────────────────────

/// Something that happened to a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripEvent {
    /// The passenger asked for a ride.
    Request,
    /// The driver's device received the offer.
    Acknowledge,
    /// The driver accepted the offer.
    Accept,
    /// The driver reached the pickup.
    ArriveAtPickup,
    /// The passenger boarded.
    Start,
    /// Reached an intermediate stop.
    ArriveAtStop,
    /// Left an intermediate stop.
    Continue,
    /// Reached the dropoff.
    ArriveAtDestination,
    /// The driver confirmed the fare was paid.
    ConfirmPayment,
    /// Either party abandoned the trip.
    Cancel,
}

impl TripEvent {
    /// Every event.
    pub const ALL: [TripEvent; 10] = [
        Self::Request,
        Self::Acknowledge,
        Self::Accept,
        Self::ArriveAtPickup,
        Self::Start,
        Self::ArriveAtStop,
        Self::Continue,
        Self::ArriveAtDestination,
        Self::ConfirmPayment,
        Self::Cancel,
    ];
}

impl std::fmt::Display for TripEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Request => "REQUEST",
            Self::Acknowledge => "ACKNOWLEDGE",
            Self::Accept => "ACCEPT",
            Self::ArriveAtPickup => "ARRIVE_AT_PICKUP",
            Self::Start => "START",
            Self::ArriveAtStop => "ARRIVE_AT_STOP",
            Self::Continue => "CONTINUE",
            Self::ArriveAtDestination => "ARRIVE_AT_DESTINATION",
            Self::ConfirmPayment => "CONFIRM_PAYMENT",
            Self::Cancel => "CANCEL",
        };
        f.write_str(s)
    }
}

/// A passenger-facing notice authorized by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    DriverArrived,
    ArrivedAtDestination,
    TripEnded,
}

impl Notice {
    /// The notice announced on entering `state`, if any.
    pub fn for_state(state: TripState) -> Option<Notice> {
        match state {
            TripState::DriverArrived => Some(Self::DriverArrived),
            TripState::Arrived => Some(Self::ArrivedAtDestination),
            TripState::Ended => Some(Self::TripEnded),
            _ => None,
        }
    }

    /// Text shown to the passenger.
    pub fn text(&self) -> &'static str {
        match self {
            Self::DriverArrived => "Your driver has arrived",
            Self::ArrivedAtDestination => "You have arrived at your destination",
            Self::TripEnded => "Thanks for riding. Please rate your driver",
        }
    }
}

/// A side effect a transition authorizes. The state machine only names
/// effects; sessions and repositories carry them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripEffect {
    /// Move the assigned driver to this state.
    SetDriverState(DriverState),
    /// Increment `next_stop`.
    AdvanceStop,
    /// Tell the passenger.
    Notify(Notice),
    /// Route the passenger to feedback collection.
    RequestFeedback,
}

/// The outcome of a table lookup: where the trip goes and what that allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TripState,
    pub to: TripState,
    pub effects: &'static [TripEffect],
}

impl Transition {
    /// The driver state this transition moves the assigned driver to.
    pub fn driver_state(&self) -> Option<DriverState> {
        self.effects.iter().find_map(|effect| match effect {
            TripEffect::SetDriverState(state) => Some(*state),
            _ => None,
        })
    }

    /// Notices authorized by this transition.
    pub fn notices(&self) -> impl Iterator<Item = Notice> + '_ {
        self.effects.iter().filter_map(|effect| match effect {
            TripEffect::Notify(notice) => Some(*notice),
            _ => None,
        })
    }

    /// Whether `next_stop` advances.
    pub fn advances_stop(&self) -> bool {
        self.effects.contains(&TripEffect::AdvanceStop)
    }
}

const NO_EFFECTS: &[TripEffect] = &[];
const ON_ACCEPT: &[TripEffect] = &[TripEffect::SetDriverState(DriverState::EnRoute)];
const ON_ARRIVE_AT_PICKUP: &[TripEffect] = &[
    TripEffect::AdvanceStop,
    TripEffect::Notify(Notice::DriverArrived),
];
const ON_START: &[TripEffect] = &[TripEffect::SetDriverState(DriverState::OnTrip)];
const ON_ARRIVE_AT_STOP: &[TripEffect] = &[TripEffect::AdvanceStop];
const ON_ARRIVE_AT_DESTINATION: &[TripEffect] = &[
    TripEffect::AdvanceStop,
    TripEffect::Notify(Notice::ArrivedAtDestination),
];
const ON_PAYMENT: &[TripEffect] = &[
    TripEffect::SetDriverState(DriverState::Available),
    TripEffect::Notify(Notice::TripEnded),
    TripEffect::RequestFeedback,
];
const ON_CANCEL: &[TripEffect] = &[TripEffect::SetDriverState(DriverState::Available)];

/// Look up the transition for `event` in `state`.
///
/// Returns `None` for every pair outside the table, including any event on
/// a terminal state.
pub fn transition(state: TripState, event: TripEvent) -> Option<Transition> {
    use TripEvent as E;
    use TripState as S;

    let (to, effects) = match (state, event) {
        (S::Unspecified, E::Request) => (S::Requested, NO_EFFECTS),
        (S::Requested, E::Acknowledge) => (S::Acknowledged, NO_EFFECTS),
        (S::Requested | S::Acknowledged, E::Accept) => (S::Accepted, ON_ACCEPT),
        (S::Accepted, E::ArriveAtPickup) => (S::DriverArrived, ON_ARRIVE_AT_PICKUP),
        (S::DriverArrived, E::Start) => (S::Ongoing, ON_START),
        (S::Ongoing, E::ArriveAtStop) => (S::AtStop, ON_ARRIVE_AT_STOP),
        (S::AtStop, E::Continue) => (S::Ongoing, NO_EFFECTS),
        (S::Ongoing, E::ArriveAtDestination) => (S::Arrived, ON_ARRIVE_AT_DESTINATION),
        (S::Arrived, E::ConfirmPayment) => (S::Ended, ON_PAYMENT),
        (s, E::Cancel) if s.is_active() => (S::Canceled, ON_CANCEL),
        _ => return None,
    };
    Some(Transition {
        from: state,
        to,
        effects,
    })
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised when building or mutating a trip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TripError {
    /// A trip needs at least a pickup and a dropoff.
    #[error("trip needs at least 2 stops, got {count}")]
    TooFewStops { count: usize },

    /// A stop has an invalid coordinate.
    #[error("invalid stop: {0}")]
    InvalidStop(#[from] CoreError),

    /// The event does not match the trip's position along its stops.
    #[error("{event} not allowed with next stop {next_stop} of {stop_count}")]
    StopOutOfSequence {
        event: TripEvent,
        next_stop: usize,
        stop_count: usize,
    },

    /// The trip already has a driver.
    #[error("trip {trip_id} already has a driver")]
    AlreadyAssigned { trip_id: TripId },

    /// Only active trips can be assigned.
    #[error("trip {trip_id} cannot be assigned in state {status}")]
    NotAssignable { trip_id: TripId, status: TripState },

    /// Payment amounts are non-negative cents.
    #[error("invalid payment amount: {0}")]
    InvalidPayment(i64),
}

// ─── Trip ────────────────────────────────────────────────────────────

/// A ride with its stops, estimates, and lifecycle timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub user_id: Option<UserId>,
    pub driver_id: Option<DriverId>,
    /// Pickup first, dropoff last.
    pub stops: Vec<Place>,
    pub next_stop: usize,
    pub status: TripState,
    pub estimated_cost_cents: i64,
    pub actual_cost_cents: Option<i64>,
    pub estimated_distance_m: f64,
    pub estimated_duration_secs: i64,
    pub actual_duration_secs: Option<i64>,
    pub route_polyline: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub driver_arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    /// Set once the passenger has rated this trip.
    #[serde(default)]
    pub feedback_given: bool,
}

impl Trip {
    /// Create a `Requested` trip for `user_id` with fare estimates filled in.
    pub fn request(
        user_id: UserId,
        stops: Vec<Place>,
        fares: &FareSchedule,
    ) -> Result<Self, TripError> {
        if stops.len() < 2 {
            return Err(TripError::TooFewStops { count: stops.len() });
        }
        for stop in &stops {
            stop.coordinate.validate()?;
        }
        let estimate = fares.estimate(&stops);
        let now = Utc::now();
        let mut trip = Self {
            id: TripId::new(),
            user_id: Some(user_id),
            driver_id: None,
            stops,
            next_stop: 0,
            status: TripState::Unspecified,
            estimated_cost_cents: estimate.cost_cents,
            actual_cost_cents: None,
            estimated_distance_m: estimate.distance_m,
            estimated_duration_secs: estimate.duration_secs,
            actual_duration_secs: None,
            route_polyline: estimate.route_polyline,
            created_at: now,
            updated_at: now,
            driver_arrived_at: None,
            started_at: None,
            ended_at: None,
            canceled_at: None,
            feedback_given: false,
        };
        trip.apply(TripEvent::Request)?;
        Ok(trip)
    }

    /// The pickup stop.
    pub fn pickup(&self) -> Option<&Place> {
        self.stops.first()
    }

    /// The stop the driver is heading to, if any remain.
    pub fn current_stop(&self) -> Option<&Place> {
        self.stops.get(self.next_stop)
    }

    /// Active and waiting for a driver.
    pub fn is_unassigned(&self) -> bool {
        self.driver_id.is_none() && self.status.is_active()
    }

    /// Apply `event`.
    ///
    /// Returns `Ok(None)` when the pair is outside the table; the trip is
    /// untouched. Stop-advancing events are checked against `next_stop` so
    /// a trip cannot skip its intermediate stops or overrun its dropoff.
    pub fn apply(&mut self, event: TripEvent) -> Result<Option<Transition>, TripError> {
        let Some(step) = transition(self.status, event) else {
            return Ok(None);
        };
        if step.advances_stop() {
            self.require_stop_sequence(event)?;
            self.next_stop += 1;
        }

        let now = Utc::now();
        match step.to {
            TripState::DriverArrived => self.driver_arrived_at = Some(now),
            TripState::Ongoing if step.from == TripState::DriverArrived => {
                self.started_at = Some(now)
            }
            TripState::Ended => self.ended_at = Some(now),
            TripState::Canceled => self.canceled_at = Some(now),
            _ => {}
        }
        self.status = step.to;
        self.updated_at = now;
        Ok(Some(step))
    }

    /// Close an `Arrived` trip with the amount the passenger paid.
    pub fn complete_with_payment(
        &mut self,
        amount_cents: i64,
    ) -> Result<Option<Transition>, TripError> {
        if amount_cents < 0 {
            return Err(TripError::InvalidPayment(amount_cents));
        }
        let step = self.apply(TripEvent::ConfirmPayment)?;
        if step.is_some() {
            self.actual_cost_cents = Some(amount_cents);
            self.actual_duration_secs = match (self.started_at, self.ended_at) {
                (Some(start), Some(end)) => Some((end - start).num_seconds()),
                _ => None,
            };
        }
        Ok(step)
    }

    /// Attach a driver to an unassigned, active trip.
    pub fn assign_driver(&mut self, driver_id: DriverId) -> Result<(), TripError> {
        if self.driver_id.is_some() {
            return Err(TripError::AlreadyAssigned { trip_id: self.id });
        }
        if !self.status.is_active() {
            return Err(TripError::NotAssignable {
                trip_id: self.id,
                status: self.status,
            });
        }
        self.driver_id = Some(driver_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require_stop_sequence(&self, event: TripEvent) -> Result<(), TripError> {
        let last = self.stops.len().saturating_sub(1);
        let in_sequence = match event {
            TripEvent::ArriveAtPickup => self.next_stop == 0,
            TripEvent::ArriveAtStop => self.next_stop > 0 && self.next_stop < last,
            TripEvent::ArriveAtDestination => self.next_stop == last,
            _ => true,
        };
        if in_sequence {
            Ok(())
        } else {
            Err(TripError::StopOutOfSequence {
                event,
                next_stop: self.next_stop,
                stop_count: self.stops.len(),
            })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
