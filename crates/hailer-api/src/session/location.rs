//! Location ingest: a client-to-server stream of position samples from one
//! driver. Nothing is sent back except the closing frame, which says "going
//! away" when the server is shutting down; bad samples are logged and skipped.

use axum::extract::ws::{Message, WebSocket};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hailer_core::DriverId;
use hailer_dispatch::TripService;
use hailer_protocol::{Envelope, LocationPacket};

/// Store every sample `driver_id` sends until the stream ends.
pub async fn run_location_stream(
    mut socket: WebSocket,
    service: TripService,
    driver_id: DriverId,
    shutdown: CancellationToken,
) {
    info!(%driver_id, "location stream opened");
    let mut accepted = 0u64;

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = socket.recv() => message,
        };
        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(%driver_id, error = %err, "location stream read failed");
                break;
            }
        };
        if ingest(&service, driver_id, text.as_str()) {
            accepted += 1;
        }
    }

    let _ = socket
        .send(Message::Close(super::close_frame(shutdown.is_cancelled())))
        .await;
    info!(%driver_id, accepted, "location stream closed");
}

fn ingest(service: &TripService, driver_id: DriverId, text: &str) -> bool {
    let location = match Envelope::<LocationPacket>::decode(text) {
        Ok(Envelope {
            packet: LocationPacket::Report { location },
            ..
        }) => location,
        Ok(_) => {
            debug!(%driver_id, "ignoring unrecognized location packet");
            return false;
        }
        Err(err) => {
            warn!(%driver_id, error = %err, "malformed location packet");
            return false;
        }
    };
    match service.record_location(driver_id, location) {
        Ok(()) => {
            counter!("hailer_locations_recorded_total").increment(1);
            true
        }
        Err(err) => {
            warn!(%driver_id, error = %err, "location rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_service;
    use hailer_core::{Coordinate, Location};
    use hailer_dispatch::LocationRepository;
    use serde_json::json;

    #[test]
    fn stores_reported_location_under_caller() {
        let service = test_service();
        let driver = DriverId::new();
        let frame = Envelope::now(LocationPacket::Report {
            location: Location::at(Coordinate::new(30.0, 31.0).unwrap()),
        })
        .encode()
        .unwrap();

        assert!(ingest(&service, driver, &frame));
        let latest = service.repositories().locations.latest_location(driver).unwrap().unwrap();
        assert_eq!(latest.driver_id, Some(driver));
    }

    #[test]
    fn skips_bad_samples() {
        let service = test_service();
        let driver = DriverId::new();
        assert!(!ingest(&service, driver, "not json"));
        assert!(!ingest(&service, driver, &json!({"type": "teleport"}).to_string()));

        let out_of_range = json!({
            "type": "report",
            "location": {
                "coordinate": {"latitude": 123.0, "longitude": 0.0},
                "timestamp": "2026-01-01T00:00:00Z"
            }
        });
        assert!(!ingest(&service, driver, &out_of_range.to_string()));
        assert_eq!(service.driver_location(driver).unwrap(), None);
    }
}
