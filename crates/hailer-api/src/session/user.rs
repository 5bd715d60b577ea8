//! Passenger session: trip requests and cancellation inbound; status,
//! notices and the assigned driver's position outbound.

use chrono::{DateTime, Utc};

use hailer_core::UserId;
use hailer_dispatch::repository::RepoResult;
use hailer_dispatch::TripService;
use hailer_protocol::{Packet, SessionPacket, UserPacket};
use hailer_state::Notice;

use super::watch::{TripChange, TripWatch};
use super::{Session, UNRECOGNIZED_PACKET};

/// One passenger's session.
#[derive(Debug, Clone)]
pub struct UserSession {
    service: TripService,
    user_id: UserId,
}

impl UserSession {
    pub fn new(service: TripService, user_id: UserId) -> Self {
        Self { service, user_id }
    }
}

/// What the passenger's poll task has already sent.
#[derive(Debug, Default)]
pub struct UserWatch {
    trip: TripWatch,
    driver_location_at: Option<DateTime<Utc>>,
}

impl Session for UserSession {
    type Packet = UserPacket;
    type PollState = UserWatch;

    fn label(&self) -> &'static str {
        "user"
    }

    fn handle(&self, packet: UserPacket) -> RepoResult<Vec<UserPacket>> {
        match packet {
            UserPacket::GetStatus => {
                let trip = self.service.active_trip_for_user(self.user_id)?;
                Ok(vec![UserPacket::status_update(trip)])
            }
            // The poller announces the new trip on its next tick.
            UserPacket::RequestTrip { stops } => {
                self.service.request_trip(self.user_id, stops)?;
                Ok(Vec::new())
            }
            UserPacket::CancelTrip => match self.service.cancel_for_user(self.user_id)? {
                Some(_) => Ok(Vec::new()),
                None => Ok(vec![UserPacket::status_update(None)]),
            },
            UserPacket::StatusUpdate { .. }
            | UserPacket::Error { .. }
            | UserPacket::Notification { .. }
            | UserPacket::DriverLocations { .. } => Ok(vec![UserPacket::error(format!(
                "{} is sent by the server only",
                packet.kind()
            ))]),
            UserPacket::Unknown => Ok(vec![UserPacket::error(UNRECOGNIZED_PACKET)]),
        }
    }

    fn poll(&self, watch: &mut UserWatch) -> RepoResult<Vec<UserPacket>> {
        let current = self.service.active_trip_for_user(self.user_id)?;
        let changes = watch
            .trip
            .observe(current.as_ref(), |trip_id| self.service.trip(trip_id))?;

        let mut packets = Vec::new();
        for change in changes {
            match change {
                TripChange::Updated { trip, transitioned } => {
                    let notice = Notice::for_state(trip.status).filter(|_| transitioned);
                    packets.push(UserPacket::status_update(Some(trip)));
                    if let Some(notice) = notice {
                        packets.push(UserPacket::notification(notice.text()));
                    }
                }
                TripChange::Cleared => {
                    watch.driver_location_at = None;
                    packets.push(UserPacket::status_update(None));
                }
            }
        }

        if let Some(driver_id) = current.as_ref().and_then(|trip| trip.driver_id) {
            if let Some(location) = self.service.driver_location(driver_id)? {
                if watch.driver_location_at != Some(location.timestamp) {
                    watch.driver_location_at = Some(location.timestamp);
                    packets.push(UserPacket::DriverLocations {
                        driver_locations: vec![location],
                    });
                }
            }
        }
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assign, stops, test_service};
    use hailer_core::{Coordinate, DriverId, Location};
    use hailer_dispatch::error::ACTIVE_TRIP_EXISTS;
    use hailer_state::{TripEvent, TripState};

    fn status_of(packet: &UserPacket) -> Option<TripState> {
        match packet {
            UserPacket::StatusUpdate { trip } => trip.as_ref().map(|t| t.status),
            _ => panic!("expected status update, got {packet:?}"),
        }
    }

    #[test]
    fn get_status_without_trip_is_null() {
        let session = UserSession::new(test_service(), UserId::new());
        let replies = session.handle(UserPacket::GetStatus).unwrap();
        assert_eq!(replies, vec![UserPacket::StatusUpdate { trip: None }]);
    }

    #[test]
    fn request_is_announced_on_next_poll() {
        let session = UserSession::new(test_service(), UserId::new());
        let mut watch = UserWatch::default();
        assert!(session.poll(&mut watch).unwrap().is_empty());

        let replies = session
            .handle(UserPacket::RequestTrip { stops: stops() })
            .unwrap();
        assert!(replies.is_empty());

        let packets = session.poll(&mut watch).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(status_of(&packets[0]), Some(TripState::Requested));

        assert!(session.poll(&mut watch).unwrap().is_empty());
    }

    #[test]
    fn second_request_is_rejected_without_side_effects() {
        let service = test_service();
        let user = UserId::new();
        let session = UserSession::new(service.clone(), user);
        session
            .handle(UserPacket::RequestTrip { stops: stops() })
            .unwrap();
        let first = service.active_trip_for_user(user).unwrap().unwrap();

        let err = session
            .handle(UserPacket::RequestTrip { stops: stops() })
            .unwrap_err();
        assert_eq!(err.to_string(), ACTIVE_TRIP_EXISTS);
        assert_eq!(service.active_trip_for_user(user).unwrap(), Some(first));
    }

    #[test]
    fn cancel_sends_terminal_snapshot_then_null() {
        let session = UserSession::new(test_service(), UserId::new());
        let mut watch = UserWatch::default();
        session
            .handle(UserPacket::RequestTrip { stops: stops() })
            .unwrap();
        session.poll(&mut watch).unwrap();

        assert!(session.handle(UserPacket::CancelTrip).unwrap().is_empty());
        let packets = session.poll(&mut watch).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(status_of(&packets[0]), Some(TripState::Canceled));
        assert_eq!(status_of(&packets[1]), None);
    }

    #[test]
    fn cancel_without_trip_reports_null_status() {
        let session = UserSession::new(test_service(), UserId::new());
        assert_eq!(
            session.handle(UserPacket::CancelTrip).unwrap(),
            vec![UserPacket::StatusUpdate { trip: None }]
        );
    }

    #[test]
    fn observed_arrival_carries_notice() {
        let service = test_service();
        let user = UserId::new();
        let driver = DriverId::new();
        let session = UserSession::new(service.clone(), user);
        let mut watch = UserWatch::default();

        let trip = service.request_trip(user, stops()).unwrap();
        assign(&service, trip.id, driver);
        service.driver_step(driver, TripEvent::Accept, None).unwrap();
        session.poll(&mut watch).unwrap();

        service
            .driver_step(driver, TripEvent::ArriveAtPickup, None)
            .unwrap();
        let packets = session.poll(&mut watch).unwrap();
        assert_eq!(status_of(&packets[0]), Some(TripState::DriverArrived));
        assert_eq!(
            packets[1],
            UserPacket::Notification {
                notification_text: "Your driver has arrived".to_string()
            }
        );
    }

    #[test]
    fn attaching_mid_trip_sends_status_without_notice() {
        let service = test_service();
        let user = UserId::new();
        let driver = DriverId::new();
        let trip = service.request_trip(user, stops()).unwrap();
        assign(&service, trip.id, driver);
        service.driver_step(driver, TripEvent::Accept, None).unwrap();
        service
            .driver_step(driver, TripEvent::ArriveAtPickup, None)
            .unwrap();

        let session = UserSession::new(service, user);
        let packets = session.poll(&mut UserWatch::default()).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(status_of(&packets[0]), Some(TripState::DriverArrived));
    }

    #[test]
    fn relays_driver_location_when_it_changes() {
        let service = test_service();
        let user = UserId::new();
        let driver = DriverId::new();
        let session = UserSession::new(service.clone(), user);
        let mut watch = UserWatch::default();

        let trip = service.request_trip(user, stops()).unwrap();
        assign(&service, trip.id, driver);
        let mut location = Location::at(Coordinate::new(30.001, 31.0).unwrap());
        location.timestamp = Utc::now() - chrono::Duration::seconds(10);
        service.record_location(driver, location).unwrap();

        let packets = session.poll(&mut watch).unwrap();
        assert!(matches!(
            packets.last(),
            Some(UserPacket::DriverLocations { driver_locations }) if driver_locations.len() == 1
        ));
        assert!(session.poll(&mut watch).unwrap().is_empty());

        service
            .record_location(driver, Location::at(Coordinate::new(30.002, 31.0).unwrap()))
            .unwrap();
        let packets = session.poll(&mut watch).unwrap();
        assert!(matches!(&packets[..], [UserPacket::DriverLocations { .. }]));
    }

    #[test]
    fn server_only_packets_are_refused() {
        let session = UserSession::new(test_service(), UserId::new());
        let replies = session.handle(UserPacket::notification("hi")).unwrap();
        assert!(matches!(
            &replies[..],
            [UserPacket::Error { error_text }] if error_text.contains("notification")
        ));
    }
}
