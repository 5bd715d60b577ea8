//! # Live Server Harness
//!
//! Starts `hailer-api` on an ephemeral local port with short poll intervals
//! and hands out clients already pointed at it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hailer_api::config::{AppConfig, SecretToken};
use hailer_api::state::AppState;
use hailer_client::config::BearerToken;
use hailer_client::{ClientConfig, ClientEvent, DriverClient, LocationReporter, UserClient};
use hailer_core::{Coordinate, DriverId, Place, UserId};

pub const SECRET: &str = "integration-secret";

/// Session and distributor poll interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a test waits for any single event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A running server.
pub struct TestServer {
    pub state: AppState,
    addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        Self::serve(listener, AppState::new(test_config()))
    }

    /// Serve `state` on an already bound listener.
    pub fn serve(listener: TcpListener, state: AppState) -> Self {
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(hailer_api::serve(listener, state.clone()));
        Self { state, addr, task }
    }

    /// Stop the server, then serve the same store again on the same port.
    pub async fn restart(self) -> Self {
        let addr = self.addr;
        let state = AppState {
            shutdown: CancellationToken::new(),
            ..self.state.clone()
        };
        self.shutdown().await;
        let listener = TcpListener::bind(addr).await.expect("rebind port");
        Self::serve(listener, state)
    }

    pub fn client_config(&self, token: BearerToken) -> ClientConfig {
        client_config(self.addr, token)
    }

    pub fn passenger(&self, id: UserId) -> UserClient {
        UserClient::from_config(&self.client_config(BearerToken::passenger(id, Some(SECRET))))
            .expect("passenger client")
    }

    pub fn driver(&self, id: DriverId) -> DriverClient {
        DriverClient::from_config(&self.client_config(BearerToken::driver(id, Some(SECRET))))
            .expect("driver client")
    }

    pub fn reporter(&self, id: DriverId) -> LocationReporter {
        LocationReporter::from_config(&self.client_config(BearerToken::driver(id, Some(SECRET))))
            .expect("location reporter")
    }

    /// A passenger client presenting `token` verbatim.
    pub fn passenger_with_token(&self, token: BearerToken) -> UserClient {
        UserClient::from_config(&self.client_config(token)).expect("passenger client")
    }

    /// Stop the server and wait for it to drain.
    pub async fn shutdown(self) {
        self.state.shutdown.cancel();
        self.task
            .await
            .expect("server task")
            .expect("server exited cleanly");
    }
}

/// Server configuration with the shared secret and short poll intervals.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.port = 0;
    config.auth_secret = Some(SecretToken::new(SECRET));
    config.session.poll_interval = POLL_INTERVAL;
    config.distributor.poll_interval = POLL_INTERVAL;
    config
}

/// Client configuration for a server at `addr`.
pub fn client_config(addr: SocketAddr, token: BearerToken) -> ClientConfig {
    let mut config = ClientConfig::new(&format!("ws://{addr}"))
        .expect("server url")
        .with_bearer(token);
    config.location_interval = Duration::from_millis(50);
    config
}

/// Wait for the first event matching `pred`, skipping the rest.
pub async fn wait_for(
    events: &mut UnboundedReceiver<ClientEvent>,
    what: &str,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap_or_else(|| panic!("event channel closed waiting for {what}"));
        if pred(&event) {
            return event;
        }
    }
}

/// Two stops a short drive apart.
pub fn stops() -> Vec<Place> {
    vec![
        Place::new("pickup", pickup()),
        Place::new("dropoff", Coordinate { latitude: 30.1, longitude: 31.1 }),
    ]
}

pub fn pickup() -> Coordinate {
    Coordinate {
        latitude: 30.0,
        longitude: 31.0,
    }
}
