//! # Duplex Trip Sessions
//!
//! One WebSocket connection is one session. A session runs three
//! activities that share a bounded, drop-oldest outbound queue:
//!
//! ```text
//! socket rx ─► inbound task ─► Session::handle ─┐
//!                                              ├─► DropOldestQueue ─► writer ─► socket tx
//! interval ──► poll task ───► Session::poll ───┘
//! ```
//!
//! The writer runs on the connection's own task; the inbound and poll tasks
//! are spawned and always awaited before [`run_session`] returns. Any of the
//! three ending, including by panic, cancels the session's token.
//!
//! A session ended by server shutdown closes with 1001 (going away) so
//! clients reconnect; every other end closes normally.
//!
//! Handler and poll failures never end a session: handler errors go back to
//! the sender as `Error` packets, poll errors are logged and retried on the
//! next tick.

pub mod driver;
pub mod location;
pub mod user;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hailer_dispatch::repository::RepoResult;
use hailer_protocol::{DropOldestQueue, Envelope, Packet, QueueClosed, SessionPacket};

use crate::config::SessionConfig;

pub use driver::DriverSession;
pub use location::run_location_stream;
pub use user::UserSession;
pub use watch::{TripChange, TripWatch};

/// Reply to an inbound packet whose `type` the server does not know.
pub const UNRECOGNIZED_PACKET: &str = "unrecognized packet type";

/// The per-caller behaviour a session runner drives.
pub trait Session: Send + Sync + 'static {
    type Packet: SessionPacket;

    /// Poll-task state, owned by that task alone.
    type PollState: Default + Send + 'static;

    /// Short label for logs and metrics.
    fn label(&self) -> &'static str;

    /// Handle one inbound packet, returning the immediate replies.
    fn handle(&self, packet: Self::Packet) -> RepoResult<Vec<Self::Packet>>;

    /// One poll tick: re-read the caller's records and report what changed.
    fn poll(&self, state: &mut Self::PollState) -> RepoResult<Vec<Self::Packet>>;
}

type Outbound<P> = Arc<DropOldestQueue<P>>;

/// Drive `session` over `socket` until either side closes or `shutdown`
/// fires.
pub async fn run_session<S: Session>(
    socket: WebSocket,
    session: Arc<S>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let label = session.label();
    let (sink, stream) = socket.split();
    let outbound: Outbound<S::Packet> = Arc::new(DropOldestQueue::new(config.queue_capacity));
    let cancel = shutdown.child_token();

    info!(session = label, "session opened");
    gauge!("hailer_open_sessions", "session" => label).increment(1.0);

    let inbound = tokio::spawn(read_inbound(
        stream,
        Arc::clone(&session),
        Arc::clone(&outbound),
        cancel.clone(),
    ));
    let poller = tokio::spawn(poll_changes(
        Arc::clone(&session),
        Arc::clone(&outbound),
        config.poll_interval,
        cancel.clone(),
    ));

    write_outbound(sink, &outbound, &cancel, &shutdown, label).await;

    cancel.cancel();
    outbound.close();
    observe(label, "inbound", inbound).await;
    observe(label, "poller", poller).await;

    gauge!("hailer_open_sessions", "session" => label).decrement(1.0);
    info!(session = label, "session closed");
}

/// Await a session task and report how it ended.
async fn observe(session: &'static str, task: &'static str, handle: JoinHandle<()>) {
    if let Err(err) = handle.await {
        if err.is_panic() {
            tracing::error!(session, task, error = %err, "session task panicked");
        } else {
            debug!(session, task, "session task cancelled");
        }
    }
}

/// The close frame to end a session with.
fn close_frame(shutting_down: bool) -> Option<CloseFrame> {
    shutting_down.then(|| CloseFrame {
        code: close_code::AWAY,
        reason: "server shutting down".into(),
    })
}

async fn write_outbound<P: SessionPacket>(
    mut sink: SplitSink<WebSocket, Message>,
    outbound: &DropOldestQueue<P>,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
    label: &'static str,
) {
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            packet = outbound.pop() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };
        let frame = match Envelope::now(packet).encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(session = label, error = %err, "dropping packet that failed to encode");
                continue;
            }
        };
        if let Err(err) = sink.send(Message::Text(frame.into())).await {
            debug!(session = label, error = %err, "client went away");
            break;
        }
    }
    // Best effort; the peer may already be gone.
    let _ = sink
        .send(Message::Close(close_frame(shutdown.is_cancelled())))
        .await;
}

async fn read_inbound<S: Session>(
    mut stream: SplitStream<WebSocket>,
    session: Arc<S>,
    outbound: Outbound<S::Packet>,
    cancel: CancellationToken,
) {
    let label = session.label();
    let _cancel_on_exit = cancel.clone().drop_guard();
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = stream.next() => message,
        };
        let replies = match message {
            Some(Ok(Message::Text(text))) => dispatch(session.as_ref(), text.as_str()),
            Some(Ok(Message::Binary(_))) => {
                vec![<S::Packet as SessionPacket>::error("binary frames are not supported")]
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(err)) => {
                debug!(session = label, error = %err, "read failed");
                break;
            }
        };
        if enqueue(&outbound, replies, label).is_err() {
            break;
        }
    }
}

/// Decode one frame and hand it to the session. Never fails; every problem
/// becomes an `Error` packet for the sender.
fn dispatch<S: Session>(session: &S, text: &str) -> Vec<S::Packet> {
    let label = session.label();
    let packet = match Envelope::<S::Packet>::decode(text) {
        Ok(envelope) => envelope.packet,
        Err(err) => {
            warn!(session = label, error = %err, "malformed packet");
            return vec![<S::Packet as SessionPacket>::error(format!("malformed packet: {err}"))];
        }
    };
    if packet.is_unknown() {
        debug!(session = label, "unrecognized packet type");
        return vec![<S::Packet as SessionPacket>::error(UNRECOGNIZED_PACKET)];
    }

    let kind = packet.kind();
    counter!("hailer_session_packets_total", "session" => label, "type" => kind).increment(1);
    match session.handle(packet) {
        Ok(replies) => replies,
        Err(err) => {
            warn!(session = label, packet = kind, error = %err, "packet handler failed");
            vec![<S::Packet as SessionPacket>::error(err.to_string())]
        }
    }
}

async fn poll_changes<S: Session>(
    session: Arc<S>,
    outbound: Outbound<S::Packet>,
    every: Duration,
    cancel: CancellationToken,
) {
    let label = session.label();
    let _cancel_on_exit = cancel.clone().drop_guard();
    let mut state = S::PollState::default();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match session.poll(&mut state) {
            Ok(packets) => {
                if enqueue(&outbound, packets, label).is_err() {
                    break;
                }
            }
            Err(err) => warn!(session = label, error = %err, "poll tick failed"),
        }
    }
}

fn enqueue<P>(
    outbound: &DropOldestQueue<P>,
    packets: Vec<P>,
    label: &'static str,
) -> Result<(), QueueClosed<P>> {
    for packet in packets {
        if outbound.push(packet)?.is_some() {
            debug!(session = label, "outbound queue full; dropped oldest packet");
            counter!("hailer_outbound_dropped_total", "session" => label).increment(1);
        }
    }
    Ok(())
}
