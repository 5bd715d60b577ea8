//! Driver session: shift control and trip steps inbound; offers and status
//! outbound.

use tracing::debug;

use hailer_core::DriverId;
use hailer_dispatch::repository::RepoResult;
use hailer_dispatch::TripService;
use hailer_protocol::{DriverPacket, Packet, SessionPacket};
use hailer_state::TripState;

use super::watch::{TripChange, TripWatch};
use super::{Session, UNRECOGNIZED_PACKET};

/// One driver's session.
#[derive(Debug, Clone)]
pub struct DriverSession {
    service: TripService,
    driver_id: DriverId,
}

impl DriverSession {
    pub fn new(service: TripService, driver_id: DriverId) -> Self {
        Self { service, driver_id }
    }
}

impl Session for DriverSession {
    type Packet = DriverPacket;
    type PollState = TripWatch;

    fn label(&self) -> &'static str {
        "driver"
    }

    fn handle(&self, packet: DriverPacket) -> RepoResult<Vec<DriverPacket>> {
        if let Some(event) = packet.trip_event() {
            let payment = match packet {
                DriverPacket::CashPaymentMade { payment_amount } => Some(payment_amount),
                _ => None,
            };
            let trip = self.service.driver_step(self.driver_id, event, payment)?;
            debug!(driver_id = %self.driver_id, trip_id = %trip.id, %event, status = %trip.status, "driver step");
            return Ok(Vec::new());
        }

        match packet {
            DriverPacket::GetStatus => {
                let trip = self.service.active_trip_for_driver(self.driver_id)?;
                Ok(vec![DriverPacket::status_update(trip)])
            }
            DriverPacket::PunchIn => {
                self.service.punch_in(self.driver_id)?;
                Ok(vec![DriverPacket::notification("You are now available for trips")])
            }
            DriverPacket::PunchOut => {
                self.service.punch_out(self.driver_id)?;
                Ok(vec![DriverPacket::notification("You are now offline")])
            }
            DriverPacket::Unknown => Ok(vec![DriverPacket::error(UNRECOGNIZED_PACKET)]),
            other => Ok(vec![DriverPacket::error(format!(
                "{} is sent by the server only",
                other.kind()
            ))]),
        }
    }

    fn poll(&self, watch: &mut TripWatch) -> RepoResult<Vec<DriverPacket>> {
        let current = self.service.active_trip_for_driver(self.driver_id)?;
        let changes = watch.observe(current.as_ref(), |trip_id| self.service.trip(trip_id))?;
        Ok(changes
            .into_iter()
            .map(|change| match change {
                TripChange::Updated {
                    trip,
                    transitioned: false,
                } if trip.status == TripState::Requested => DriverPacket::OfferTrip { trip },
                TripChange::Updated { trip, .. } => DriverPacket::status_update(Some(trip)),
                TripChange::Cleared => DriverPacket::status_update(None),
            })
            .collect())
    }
}
