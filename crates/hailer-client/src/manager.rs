//! # Connection Manager
//!
//! Owns one logical session: a background task that connects, pumps
//! packets both ways, and reconnects on transient failures.
//!
//! - Outbound packets go through a bounded drop-oldest queue. [`send`]
//!   refuses packets unless the session is `Connected`.
//! - Inbound packets become [`ClientEvent`]s delivered to every subscriber
//!   in arrival order. Unknown packet types are dropped.
//! - The newest trip snapshot is cached and readable from any thread.
//!
//! Transient failures retry after [`Backoff::delay`]; the attempt counter
//! resets on every successful connection. A failed first attempt goes
//! `Connecting, Reconnecting, Connected`; losing an open session goes
//! `Reconnecting, Connecting, Connected`. Terminal failures surface as
//! [`ClientEvent::Failed`] and settle at `Disconnected`, as does a peer that
//! closes for good.
//!
//! [`send`]: ConnectionManager::send

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hailer_core::{Location, Place};
use hailer_protocol::{DriverPacket, DropOldestQueue, Envelope, LocationPacket, Packet, UserPacket};
use hailer_state::{ConnectionState, Trip};

use crate::backoff::Backoff;
use crate::config::{ClientConfig, ConfigError, DRIVER_SESSION_PATH, USER_SESSION_PATH};
use crate::error::{ClientError, TransportError};
use crate::transport::{Connection, Connector, WsConnector};

// ─── Events ──────────────────────────────────────────────────────────

/// What subscribers hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged(ConnectionState),
    /// A `StatusUpdate`; `None` when the caller has no active trip.
    StatusChanged(Option<Trip>),
    /// An `Error` packet from the server.
    Error(String),
    Notification(String),
    /// An `OfferTrip` (drivers only).
    OfferReceived(Trip),
    /// The assigned driver's position (passengers only).
    DriverLocations(Vec<Location>),
    /// A terminal transport failure. The manager stops after this.
    Failed(TransportError),
}

/// A packet union the manager can carry.
pub trait ClientPacket: Packet {
    /// The event an inbound packet stands for, or `None` for packets only
    /// a client sends.
    fn into_event(self) -> Option<ClientEvent>;
}

impl ClientPacket for UserPacket {
    fn into_event(self) -> Option<ClientEvent> {
        match self {
            Self::StatusUpdate { trip } => Some(ClientEvent::StatusChanged(trip)),
            Self::Error { error_text } => Some(ClientEvent::Error(error_text)),
            Self::Notification { notification_text } => {
                Some(ClientEvent::Notification(notification_text))
            }
            Self::DriverLocations { driver_locations } => {
                Some(ClientEvent::DriverLocations(driver_locations))
            }
            Self::GetStatus | Self::RequestTrip { .. } | Self::CancelTrip | Self::Unknown => None,
        }
    }
}

impl ClientPacket for DriverPacket {
    fn into_event(self) -> Option<ClientEvent> {
        match self {
            Self::StatusUpdate { trip } => Some(ClientEvent::StatusChanged(trip)),
            Self::OfferTrip { trip } => Some(ClientEvent::OfferReceived(trip)),
            Self::Error { error_text } => Some(ClientEvent::Error(error_text)),
            Self::Notification { notification_text } => {
                Some(ClientEvent::Notification(notification_text))
            }
            _ => None,
        }
    }
}

impl ClientPacket for LocationPacket {
    fn into_event(self) -> Option<ClientEvent> {
        None
    }
}

// ─── Shared State ────────────────────────────────────────────────────

/// State readable from any thread. Locks guard single fields and are never
/// held across an await.
#[derive(Debug, Default)]
struct Shared {
    state: RwLock<ConnectionState>,
    current_trip: RwLock<Option<Trip>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>,
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.write();
            let changed = *state != next;
            *state = next;
            changed
        };
        if changed {
            debug!(state = %next, "connection state");
            self.emit(ClientEvent::StateChanged(next));
        }
    }

    fn receive<P: ClientPacket>(&self, frame: &str) {
        let packet = match Envelope::<P>::decode(frame) {
            Ok(envelope) => envelope.packet,
            Err(err) => {
                warn!(error = %err, "dropping malformed packet");
                return;
            }
        };
        if packet.is_unknown() {
            debug!("dropping packet of unknown type");
            return;
        }
        let Some(event) = packet.into_event() else {
            return;
        };
        match &event {
            ClientEvent::StatusChanged(trip) => *self.current_trip.write() = trip.clone(),
            ClientEvent::OfferReceived(trip) => *self.current_trip.write() = Some(trip.clone()),
            _ => {}
        }
        self.emit(event);
    }
}

// ─── Manager ─────────────────────────────────────────────────────────

struct Running<P> {
    cancel: CancellationToken,
    outbound: Arc<DropOldestQueue<P>>,
    task: JoinHandle<()>,
}

/// One reconnecting session over a [`Connector`].
pub struct ConnectionManager<P, C = WsConnector> {
    connector: Arc<C>,
    backoff: Backoff,
    queue_capacity: usize,
    shared: Arc<Shared>,
    running: Mutex<Option<Running<P>>>,
}

/// A passenger session.
pub type UserClient<C = WsConnector> = ConnectionManager<UserPacket, C>;

/// A driver session.
pub type DriverClient<C = WsConnector> = ConnectionManager<DriverPacket, C>;

impl<P: ClientPacket, C: Connector> ConnectionManager<P, C> {
    pub fn new(connector: C, backoff: Backoff, queue_capacity: usize) -> Self {
        Self {
            connector: Arc::new(connector),
            backoff,
            queue_capacity,
            shared: Arc::new(Shared::default()),
            running: Mutex::new(None),
        }
    }

    /// A channel receiving every event from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// The last trip snapshot the server sent.
    pub fn current_trip(&self) -> Option<Trip> {
        self.shared.current_trip.read().clone()
    }

    /// Start the session task. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let outbound = Arc::new(DropOldestQueue::new(self.queue_capacity));
        let task = tokio::spawn(run(
            Arc::clone(&self.connector),
            Arc::clone(&self.shared),
            Arc::clone(&outbound),
            self.backoff,
            cancel.clone(),
        ));
        *running = Some(Running {
            cancel,
            outbound,
            task,
        });
    }

    /// Queue `packet` for the server.
    ///
    /// Fails with [`ClientError::NotConnected`] unless the session is
    /// `Connected`.
    pub fn send(&self, packet: P) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let running = self.running.lock();
        let outbound = &running.as_ref().ok_or(ClientError::NotConnected)?.outbound;
        match outbound.push(packet) {
            Ok(Some(dropped)) => {
                warn!(dropped = dropped.kind(), "send queue full; dropped oldest packet");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(_) => Err(ClientError::NotConnected),
        }
    }

    /// Stop the session and wait for its task to finish.
    pub async fn disconnect(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        running.cancel.cancel();
        running.outbound.close();
        if let Err(err) = running.task.await {
            tracing::error!(error = %err, "connection task failed");
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl<P: ClientPacket> ConnectionManager<P, WsConnector> {
    /// A WebSocket session against `path` on the configured server.
    pub fn over_websocket(config: &ClientConfig, path: &str) -> Result<Self, ConfigError> {
        let connector = WsConnector::new(config.endpoint(path)?, config.token.clone());
        Ok(Self::new(connector, config.backoff, config.queue_capacity))
    }
}

impl UserClient {
    /// A passenger session on the configured server.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::over_websocket(config, USER_SESSION_PATH)
    }
}

impl DriverClient {
    /// A driver session on the configured server.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::over_websocket(config, DRIVER_SESSION_PATH)
    }
}

impl<C: Connector> ConnectionManager<UserPacket, C> {
    pub fn get_status(&self) -> Result<(), ClientError> {
        self.send(UserPacket::GetStatus)
    }

    pub fn request_trip(&self, stops: Vec<Place>) -> Result<(), ClientError> {
        self.send(UserPacket::RequestTrip { stops })
    }

    pub fn cancel_trip(&self) -> Result<(), ClientError> {
        self.send(UserPacket::CancelTrip)
    }
}

impl<C: Connector> ConnectionManager<DriverPacket, C> {
    pub fn get_status(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::GetStatus)
    }

    pub fn punch_in(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::PunchIn)
    }

    pub fn punch_out(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::PunchOut)
    }

    /// Tell the server the offer reached the device.
    pub fn trip_received(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::TripReceived)
    }

    pub fn accept_trip(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::AcceptTrip)
    }

    pub fn arrived_at_pickup(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::ArrivedAtPickup)
    }

    pub fn start_trip(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::StartTrip)
    }

    /// Reached an intermediate stop.
    pub fn arrived_at_stop(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::ArrivedAtStop)
    }

    /// Leave an intermediate stop.
    pub fn continue_trip(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::ContinueTrip)
    }

    pub fn arrived_at_destination(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::ArrivedAtDestination)
    }

    pub fn cash_payment_made(&self, payment_amount: i64) -> Result<(), ClientError> {
        self.send(DriverPacket::CashPaymentMade { payment_amount })
    }

    pub fn cancel_trip(&self) -> Result<(), ClientError> {
        self.send(DriverPacket::CancelTrip)
    }
}

impl<P, C> Drop for ConnectionManager<P, C> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
            running.outbound.close();
        }
    }
}

impl<P, C> std::fmt::Debug for ConnectionManager<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &*self.shared.state.read())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

// ─── Session Task ────────────────────────────────────────────────────

enum PumpEnd {
    Cancelled,
    ClosedByPeer,
    Failed(TransportError),
}

async fn run<P: ClientPacket, C: Connector>(
    connector: Arc<C>,
    shared: Arc<Shared>,
    outbound: Arc<DropOldestQueue<P>>,
    backoff: Backoff,
    cancel: CancellationToken,
) {
    let mut rng = StdRng::from_entropy();
    let mut attempt: u32 = 0;
    shared.set_state(ConnectionState::Connecting);
    // Set after an established connection drops, so the next attempt is
    // announced as a fresh `Connecting`.
    let mut resuming = false;

    loop {
        if std::mem::take(&mut resuming) {
            shared.set_state(ConnectionState::Connecting);
        }
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connector.connect() => result,
        };
        let failure = match connected {
            Ok(connection) => {
                attempt = 0;
                shared.set_state(ConnectionState::Connected);
                info!("session connected");
                match pump(connection, &shared, &outbound, &cancel).await {
                    PumpEnd::Cancelled => break,
                    PumpEnd::ClosedByPeer => {
                        info!("server closed the session");
                        break;
                    }
                    PumpEnd::Failed(err) => {
                        resuming = true;
                        err
                    }
                }
            }
            Err(err) => err,
        };

        if !failure.is_transient() {
            warn!(error = %failure, "terminal connection failure");
            shared.emit(ClientEvent::Failed(failure));
            break;
        }

        attempt += 1;
        let delay = backoff.delay(attempt, &mut rng);
        warn!(error = %failure, attempt, delay_ms = delay.as_millis() as u64, "connection lost; retrying");
        shared.set_state(ConnectionState::Reconnecting);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

async fn pump<P: ClientPacket>(
    connection: Connection,
    shared: &Shared,
    outbound: &DropOldestQueue<P>,
    cancel: &CancellationToken,
) -> PumpEnd {
    let Connection {
        mut sink,
        mut stream,
    } = connection;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return PumpEnd::Cancelled;
            }
            packet = outbound.pop() => {
                let Some(packet) = packet else {
                    let _ = sink.close().await;
                    return PumpEnd::Cancelled;
                };
                let frame = match Envelope::now(packet).encode() {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "dropping packet that failed to encode");
                        continue;
                    }
                };
                if let Err(err) = sink.send(frame).await {
                    return PumpEnd::Failed(err);
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(text)) => shared.receive::<P>(&text),
                Some(Err(err)) => return PumpEnd::Failed(err),
                None => return PumpEnd::ClosedByPeer,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use hailer_core::{Coordinate, FareSchedule, UserId};
    use hailer_protocol::SessionPacket;

    use crate::error::FailureCode;

    /// The server's end of a scripted connection.
    pub(crate) struct Peer {
        pub to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
        pub from_client: mpsc::UnboundedReceiver<String>,
    }

    pub(crate) fn pipe() -> (Connection, Peer) {
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();
        let sink = futures_util::sink::unfold(client_tx, |tx, frame: String| async move {
            tx.send(frame)
                .map_err(|_| TransportError::new(FailureCode::Unavailable, "peer gone"))?;
            Ok::<_, TransportError>(tx)
        });
        let stream = futures_util::stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let connection = Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        };
        (connection, Peer { to_client, from_client })
    }

    /// Hands out scripted outcomes in order, then never completes.
    #[derive(Default)]
    pub(crate) struct ScriptedConnector {
        script: Mutex<VecDeque<Result<Connection, TransportError>>>,
        pub attempts: Mutex<u32>,
    }

    impl ScriptedConnector {
        pub fn new(script: Vec<Result<Connection, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                attempts: Mutex::new(0),
            }
        }
    }

    impl Connector for ScriptedConnector {
        async fn connect(&self) -> Result<Connection, TransportError> {
            *self.attempts.lock() += 1;
            let next = self.script.lock().pop_front();
            match next {
                Some(outcome) => outcome,
                None => std::future::pending().await,
            }
        }
    }

    fn manager(script: Vec<Result<Connection, TransportError>>) -> UserClient<ScriptedConnector> {
        ConnectionManager::new(ScriptedConnector::new(script), Backoff::default(), 20)
    }

    fn unavailable() -> TransportError {
        TransportError::new(FailureCode::Unavailable, "connection refused")
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Collect state changes until `last` is reached.
    async fn states_until(
        events: &mut mpsc::UnboundedReceiver<ClientEvent>,
        last: ConnectionState,
    ) -> Vec<ConnectionState> {
        let mut states = Vec::new();
        loop {
            if let ClientEvent::StateChanged(state) = next_event(events).await {
                states.push(state);
                if state == last {
                    return states;
                }
            }
        }
    }

    fn trip() -> Trip {
        let stops = vec![
            Place::new("pickup", Coordinate::new(30.0, 31.0).unwrap()),
            Place::new("dropoff", Coordinate::new(30.1, 31.1).unwrap()),
        ];
        Trip::request(UserId::new(), stops, &FareSchedule::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn clean_connect_is_connecting_then_connected() {
        let (connection, _peer) = pipe();
        let client = manager(vec![Ok(connection)]);
        let mut events = client.subscribe();
        client.connect();

        let states = states_until(&mut events, ConnectionState::Connected).await;
        assert_eq!(states, vec![ConnectionState::Connecting, ConnectionState::Connected]);
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_through_reconnecting() {
        let (connection, peer) = pipe();
        let client = manager(vec![Err(unavailable()), Ok(connection)]);
        let mut events = client.subscribe();
        client.connect();

        let states = states_until(&mut events, ConnectionState::Connected).await;
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Reconnecting,
                ConnectionState::Connected
            ]
        );
        assert_eq!(*client.connector.attempts.lock(), 2);

        let trip = trip();
        let frame = Envelope::now(UserPacket::status_update(Some(trip.clone())))
            .encode()
            .unwrap();
        peer.to_client.send(Ok(frame)).unwrap();
        match next_event(&mut events).await {
            ClientEvent::StatusChanged(Some(seen)) => assert_eq!(seen.id, trip.id),
            other => panic!("expected status update, got {other:?}"),
        }
        assert_eq!(client.current_trip().map(|t| t.id), Some(trip.id));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_settles_disconnected() {
        let denied = TransportError::new(FailureCode::Unauthenticated, "HTTP 401");
        let client = manager(vec![Err(denied.clone())]);
        let mut events = client.subscribe();
        client.connect();

        let mut seen = Vec::new();
        loop {
            let event = next_event(&mut events).await;
            let done = event == ClientEvent::StateChanged(ConnectionState::Disconnected);
            seen.push(event);
            if done {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                ClientEvent::StateChanged(ConnectionState::Connecting),
                ClientEvent::Failed(denied),
                ClientEvent::StateChanged(ConnectionState::Disconnected),
            ]
        );
        assert_eq!(*client.connector.attempts.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_connected_state() {
        let (connection, mut peer) = pipe();
        let client = manager(vec![Ok(connection)]);
        assert!(matches!(client.get_status(), Err(ClientError::NotConnected)));

        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        client.get_status().unwrap();
        let frame = peer.from_client.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "get_status");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_stream_reconnects_through_connecting() {
        let (first, first_peer) = pipe();
        let (second, _second_peer) = pipe();
        let client = manager(vec![Ok(first), Ok(second)]);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        first_peer.to_client.send(Err(unavailable())).unwrap();
        let states = states_until(&mut events, ConnectionState::Connected).await;
        assert_eq!(
            states,
            vec![
                ConnectionState::Reconnecting,
                ConnectionState::Connecting,
                ConnectionState::Connected
            ]
        );
        assert_eq!(*client.connector.attempts.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn server_going_away_is_retried_until_it_returns() {
        let (first, first_peer) = pipe();
        let (second, _second_peer) = pipe();
        let client = manager(vec![Ok(first), Err(unavailable()), Err(unavailable()), Ok(second)]);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        let going_away = TransportError::new(FailureCode::Unavailable, "server closed with 1001");
        first_peer.to_client.send(Err(going_away)).unwrap();
        let states = states_until(&mut events, ConnectionState::Connected).await;
        assert_eq!(
            states,
            vec![
                ConnectionState::Reconnecting,
                ConnectionState::Connecting,
                ConnectionState::Reconnecting,
                ConnectionState::Connected
            ]
        );
        assert_eq!(*client.connector.attempts.lock(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_ends_the_session() {
        let (connection, peer) = pipe();
        let client = manager(vec![Ok(connection)]);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        drop(peer);
        let states = states_until(&mut events, ConnectionState::Disconnected).await;
        assert_eq!(states, vec![ConnectionState::Disconnected]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_and_malformed_frames_are_dropped() {
        let (connection, peer) = pipe();
        let client = manager(vec![Ok(connection)]);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        peer.to_client.send(Ok("not json".to_string())).unwrap();
        peer.to_client
            .send(Ok(r#"{"type":"teleport"}"#.to_string()))
            .unwrap();
        let error = Envelope::now(UserPacket::error("boom")).encode().unwrap();
        peer.to_client.send(Ok(error)).unwrap();

        assert_eq!(next_event(&mut events).await, ClientEvent::Error("boom".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_steps_go_out_in_order() {
        let (connection, mut peer) = pipe();
        let client: DriverClient<ScriptedConnector> =
            ConnectionManager::new(ScriptedConnector::new(vec![Ok(connection)]), Backoff::default(), 20);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        client.trip_received().unwrap();
        client.accept_trip().unwrap();
        client.arrived_at_pickup().unwrap();
        client.start_trip().unwrap();
        client.arrived_at_destination().unwrap();
        client.cash_payment_made(1500).unwrap();

        let mut kinds = Vec::new();
        for _ in 0..6 {
            let frame = peer.from_client.recv().await.unwrap();
            let packet = Envelope::<DriverPacket>::decode(&frame).unwrap().packet;
            kinds.push(packet.kind());
        }
        assert_eq!(
            kinds,
            vec![
                "trip_received",
                "accept_trip",
                "arrived_at_pickup",
                "start_trip",
                "arrived_at_destination",
                "cash_payment_made"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_waits_for_the_task() {
        let (connection, _peer) = pipe();
        let client = manager(vec![Ok(connection)]);
        let mut events = client.subscribe();
        client.connect();
        states_until(&mut events, ConnectionState::Connected).await;

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.get_status(), Err(ClientError::NotConnected)));
    }
}
