//! # Packets
//!
//! Closed unions for the three session flavours. Adding a variant forces
//! every `match` over packets in the server and client to handle it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use hailer_core::{Location, Place, TripId};
use hailer_state::{Trip, TripEvent};

/// Common behaviour of every packet union.
pub trait Packet: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The wire `type` tag, for logs and metrics.
    fn kind(&self) -> &'static str;

    /// Whether this decoded from a `type` the receiver does not know.
    fn is_unknown(&self) -> bool;
}

/// Packets exchanged on a trip session, as opposed to the location stream.
pub trait SessionPacket: Packet {
    /// A `StatusUpdate` carrying `trip`, or `null` when there is none.
    fn status_update(trip: Option<Trip>) -> Self;

    /// An application error addressed to the sender.
    fn error(text: impl Into<String>) -> Self;

    /// A human-readable notice.
    fn notification(text: impl Into<String>) -> Self;
}

// ─── Passenger Session ───────────────────────────────────────────────

/// Packets on a passenger session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserPacket {
    /// Ask for the current trip. Answered with `StatusUpdate`.
    GetStatus,
    /// Ask for a ride visiting `stops` (pickup first, dropoff last).
    RequestTrip { stops: Vec<Place> },
    /// Cancel the active trip.
    CancelTrip,
    /// The caller's current trip, or `null` when there is none.
    StatusUpdate {
        #[serde(default)]
        trip: Option<Trip>,
    },
    Error { error_text: String },
    Notification { notification_text: String },
    /// Latest position of the assigned driver.
    DriverLocations { driver_locations: Vec<Location> },
    #[serde(other)]
    Unknown,
}

impl Packet for UserPacket {
    fn kind(&self) -> &'static str {
        match self {
            Self::GetStatus => "get_status",
            Self::RequestTrip { .. } => "request_trip",
            Self::CancelTrip => "cancel_trip",
            Self::StatusUpdate { .. } => "status_update",
            Self::Error { .. } => "error",
            Self::Notification { .. } => "notification",
            Self::DriverLocations { .. } => "driver_locations",
            Self::Unknown => "unknown",
        }
    }

    fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl SessionPacket for UserPacket {
    fn status_update(trip: Option<Trip>) -> Self {
        Self::StatusUpdate { trip }
    }

    fn error(text: impl Into<String>) -> Self {
        Self::Error {
            error_text: text.into(),
        }
    }

    fn notification(text: impl Into<String>) -> Self {
        Self::Notification {
            notification_text: text.into(),
        }
    }
}

// ─── Driver Session ──────────────────────────────────────────────────

/// Packets on a driver session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverPacket {
    GetStatus,
    /// Start a shift.
    PunchIn,
    /// End a shift.
    PunchOut,
    /// The device has shown the offer.
    TripReceived,
    AcceptTrip,
    ArrivedAtPickup,
    StartTrip,
    ArrivedAtStop,
    ContinueTrip,
    ArrivedAtDestination,
    /// The passenger paid `payment_amount` cents in cash.
    CashPaymentMade { payment_amount: i64 },
    CancelTrip,
    /// Sent unsolicited when the distributor assigns this driver.
    OfferTrip { trip: Trip },
    StatusUpdate {
        #[serde(default)]
        trip: Option<Trip>,
    },
    Error { error_text: String },
    Notification { notification_text: String },
    #[serde(other)]
    Unknown,
}

impl DriverPacket {
    /// The trip event a step-progression packet stands for.
    pub fn trip_event(&self) -> Option<TripEvent> {
        match self {
            Self::TripReceived => Some(TripEvent::Acknowledge),
            Self::AcceptTrip => Some(TripEvent::Accept),
            Self::ArrivedAtPickup => Some(TripEvent::ArriveAtPickup),
            Self::StartTrip => Some(TripEvent::Start),
            Self::ArrivedAtStop => Some(TripEvent::ArriveAtStop),
            Self::ContinueTrip => Some(TripEvent::Continue),
            Self::ArrivedAtDestination => Some(TripEvent::ArriveAtDestination),
            Self::CashPaymentMade { .. } => Some(TripEvent::ConfirmPayment),
            Self::CancelTrip => Some(TripEvent::Cancel),
            _ => None,
        }
    }
}

impl Packet for DriverPacket {
    fn kind(&self) -> &'static str {
        match self {
            Self::GetStatus => "get_status",
            Self::PunchIn => "punch_in",
            Self::PunchOut => "punch_out",
            Self::TripReceived => "trip_received",
            Self::AcceptTrip => "accept_trip",
            Self::ArrivedAtPickup => "arrived_at_pickup",
            Self::StartTrip => "start_trip",
            Self::ArrivedAtStop => "arrived_at_stop",
            Self::ContinueTrip => "continue_trip",
            Self::ArrivedAtDestination => "arrived_at_destination",
            Self::CashPaymentMade { .. } => "cash_payment_made",
            Self::CancelTrip => "cancel_trip",
            Self::OfferTrip { .. } => "offer_trip",
            Self::StatusUpdate { .. } => "status_update",
            Self::Error { .. } => "error",
            Self::Notification { .. } => "notification",
            Self::Unknown => "unknown",
        }
    }

    fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl SessionPacket for DriverPacket {
    fn status_update(trip: Option<Trip>) -> Self {
        Self::StatusUpdate { trip }
    }

    fn error(text: impl Into<String>) -> Self {
        Self::Error {
            error_text: text.into(),
        }
    }

    fn notification(text: impl Into<String>) -> Self {
        Self::Notification {
            notification_text: text.into(),
        }
    }
}

// ─── Location Stream ─────────────────────────────────────────────────

/// Packets on the client-to-server location stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationPacket {
    /// One position sample.
    Report { location: Location },
    #[serde(other)]
    Unknown,
}

impl Packet for LocationPacket {
    fn kind(&self) -> &'static str {
        match self {
            Self::Report { .. } => "report",
            Self::Unknown => "unknown",
        }
    }

    fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

// ─── Feedback ────────────────────────────────────────────────────────

/// A passenger's rating of a finished trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub trip_id: TripId,
    /// 1 to 5.
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
