//! # Location Reporter
//!
//! Streams a driver's position over its own connection. Callers push
//! samples as often as the device produces them; every interval the newest
//! one is sent and older ones are discarded. A sample taken while the
//! connection is down waits for the next connected tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hailer_core::Location;
use hailer_protocol::LocationPacket;
use hailer_state::ConnectionState;

use crate::config::{ClientConfig, ConfigError, LOCATION_PATH};
use crate::manager::{ClientEvent, ConnectionManager};
use crate::transport::{Connector, WsConnector};

struct Ticker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Sends the most recent position sample on a fixed interval.
pub struct LocationReporter<C = WsConnector> {
    manager: Arc<ConnectionManager<LocationPacket, C>>,
    latest: Arc<Mutex<Option<Location>>>,
    interval: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl LocationReporter {
    /// A reporter for the configured server's location endpoint.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let manager = ConnectionManager::over_websocket(config, LOCATION_PATH)?;
        Ok(Self::new(manager, config.location_interval))
    }
}

impl<C: Connector> LocationReporter<C> {
    pub fn new(manager: ConnectionManager<LocationPacket, C>, interval: Duration) -> Self {
        Self {
            manager: Arc::new(manager),
            latest: Arc::new(Mutex::new(None)),
            interval,
            ticker: Mutex::new(None),
        }
    }

    /// Replace the pending sample.
    pub fn update(&self, location: Location) {
        *self.latest.lock() = Some(location);
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.manager.subscribe()
    }

    /// Connect and start the send interval. Idempotent.
    pub fn start(&self) {
        self.manager.connect();
        let mut ticker = self.ticker.lock();
        if ticker.as_ref().is_some_and(|t| !t.task.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(report_latest(
            Arc::clone(&self.manager),
            Arc::clone(&self.latest),
            self.interval,
            cancel.clone(),
        ));
        *ticker = Some(Ticker { cancel, task });
    }

    /// Stop the interval and close the connection.
    pub async fn stop(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            if let Err(err) = ticker.task.await {
                tracing::error!(error = %err, "location ticker failed");
            }
        }
        self.manager.disconnect().await;
    }
}

impl<C> Drop for LocationReporter<C> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.cancel.cancel();
        }
    }
}

async fn report_latest<C: Connector>(
    manager: Arc<ConnectionManager<LocationPacket, C>>,
    latest: Arc<Mutex<Option<Location>>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval(interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticks.tick() => {}
        }
        if manager.state() != ConnectionState::Connected {
            continue;
        }
        let Some(location) = latest.lock().take() else {
            continue;
        };
        match manager.send(LocationPacket::Report {
            location: location.clone(),
        }) {
            Ok(()) => debug!("location sent"),
            Err(err) => {
                warn!(error = %err, "location not sent; keeping sample");
                latest.lock().get_or_insert(location);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hailer_core::Coordinate;
    use hailer_protocol::Envelope;

    use crate::backoff::Backoff;
    use crate::error::{FailureCode, TransportError};
    use crate::manager::tests::{pipe, Peer, ScriptedConnector};
    use crate::transport::Connection;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn reporter(
        script: Vec<Result<Connection, TransportError>>,
    ) -> LocationReporter<ScriptedConnector> {
        let manager = ConnectionManager::new(ScriptedConnector::new(script), Backoff::default(), 20);
        LocationReporter::new(manager, INTERVAL)
    }

    fn sample(latitude: f64) -> Location {
        Location::at(Coordinate::new(latitude, 31.0).unwrap())
    }

    async fn wait_connected(events: &mut mpsc::UnboundedReceiver<ClientEvent>) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
                .await
                .expect("timed out waiting for connection")
                .expect("event channel closed");
            if event == ClientEvent::StateChanged(ConnectionState::Connected) {
                return;
            }
        }
    }

    async fn next_report(peer: &mut Peer) -> Location {
        let frame = tokio::time::timeout(Duration::from_secs(60), peer.from_client.recv())
            .await
            .expect("timed out waiting for report")
            .expect("client hung up");
        match Envelope::<LocationPacket>::decode(&frame).unwrap().packet {
            LocationPacket::Report { location } => location,
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_newest_sample_is_sent() {
        let (connection, mut peer) = pipe();
        let reporter = reporter(vec![Ok(connection)]);
        let mut events = reporter.subscribe();
        reporter.start();
        wait_connected(&mut events).await;

        reporter.update(sample(30.0));
        reporter.update(sample(30.5));
        let sent = next_report(&mut peer).await;
        assert_eq!(sent.coordinate.latitude, 30.5);

        let quiet = tokio::time::timeout(INTERVAL * 2, peer.from_client.recv()).await;
        assert!(quiet.is_err(), "a sample is sent once");
    }

    #[tokio::test(start_paused = true)]
    async fn sample_waits_for_a_connection() {
        let (connection, mut peer) = pipe();
        let refused = TransportError::new(FailureCode::Unavailable, "connection refused");
        let reporter = reporter(vec![Err(refused), Ok(connection)]);
        let mut events = reporter.subscribe();

        reporter.update(sample(29.9));
        reporter.start();
        wait_connected(&mut events).await;

        let sent = next_report(&mut peer).await;
        assert_eq!(sent.coordinate.latitude, 29.9);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_the_connection() {
        let (connection, _peer) = pipe();
        let reporter = reporter(vec![Ok(connection)]);
        let mut events = reporter.subscribe();
        reporter.start();
        wait_connected(&mut events).await;

        reporter.stop().await;
        assert_eq!(reporter.state(), ConnectionState::Disconnected);
    }
}
