//! # Transport
//!
//! A [`Connector`] opens one duplex text-frame [`Connection`]. The
//! connection manager only sees this seam, so tests can script connection
//! outcomes without a network.
//!
//! [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`. Handshake and stream failures are mapped to a
//! [`FailureCode`]:
//!
//! | Failure | Code |
//! |---|---|
//! | HTTP 401 | `Unauthenticated` |
//! | HTTP 403 | `PermissionDenied` |
//! | HTTP 404 | `NotFound` |
//! | other HTTP 4xx | `InvalidArgument` (429: `ResourceExhausted`) |
//! | HTTP 500 | `Internal` |
//! | other HTTP 5xx, I/O, reset | `Unavailable` |
//! | bad URL | `InvalidArgument` |
//! | close 1001, 1011, 1012, 1013 | `Unavailable` |
//! | stream ends without a close frame | `Unavailable` |
//!
//! Any other close frame ends the stream cleanly.

use std::future::Future;
use std::pin::Pin;

use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;
use url::Url;

use crate::config::BearerToken;
use crate::error::{FailureCode, TransportError};

/// Outbound half: accepts encoded text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half: yields text frames until the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open duplex connection. The stream ending without an error means the
/// peer closed for good; a peer that is going away and expects clients back
/// surfaces as a transient error instead.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens connections to one endpoint.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<Connection, TransportError>> + Send;
}

/// WebSocket connector with bearer authentication.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    token: Option<BearerToken>,
}

impl WsConnector {
    pub fn new(url: Url, token: Option<BearerToken>) -> Self {
        Self { url, token }
    }
}

impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(classify)?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
                TransportError::new(FailureCode::InvalidArgument, "token is not a valid header value")
            })?;
            request.headers_mut().insert("authorization", value);
        }

        let (ws, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(classify)?;
        debug!(url = %self.url, status = %response.status(), "websocket connected");

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(classify)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));
        let stream = futures_util::stream::unfold(Some(stream), |state| async move {
            let mut stream = state?;
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => return Some((Ok(text), Some(stream))),
                    Some(Ok(Message::Close(frame))) => {
                        return close_failure(frame.as_ref()).map(|err| (Err(err), None));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Some((Err(classify(err)), None)),
                    None => {
                        let err = TransportError::new(
                            FailureCode::Unavailable,
                            "connection dropped without a close frame",
                        );
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

/// The failure a close frame stands for, or `None` for a final close.
pub fn close_failure(frame: Option<&CloseFrame<'_>>) -> Option<TransportError> {
    let frame = frame?;
    match frame.code {
        CloseCode::Away | CloseCode::Error | CloseCode::Restart | CloseCode::Again => {
            Some(TransportError::new(
                FailureCode::Unavailable,
                format!("server closed with {}: {}", u16::from(frame.code), frame.reason),
            ))
        }
        _ => None,
    }
}

/// Map a tungstenite failure to a [`TransportError`].
pub fn classify(err: tungstenite::Error) -> TransportError {
    use tungstenite::Error as E;

    let code = match &err {
        E::Http(response) => match response.status().as_u16() {
            401 => FailureCode::Unauthenticated,
            403 => FailureCode::PermissionDenied,
            404 => FailureCode::NotFound,
            429 => FailureCode::ResourceExhausted,
            400..=499 => FailureCode::InvalidArgument,
            500 => FailureCode::Internal,
            _ => FailureCode::Unavailable,
        },
        E::Io(_) | E::ConnectionClosed | E::AlreadyClosed | E::Protocol(_) => {
            FailureCode::Unavailable
        }
        E::Url(_) | E::HttpFormat(_) => FailureCode::InvalidArgument,
        E::Capacity(_) => FailureCode::ResourceExhausted,
        _ => FailureCode::Unknown,
    };
    TransportError::new(code, err.to_string())
}
