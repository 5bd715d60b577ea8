//! # Session Upgrades
//!
//! WebSocket entry points. Authentication and role checks run as ordinary
//! extractors, so a bad token is refused with 401/403 before the upgrade.
//! The caller's account is provisioned on first contact.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::auth::{Driver, Passenger};
use crate::error::AppError;
use crate::session::{run_location_stream, run_session, DriverSession, UserSession};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions/user", get(user_session))
        .route("/v1/sessions/driver", get(driver_session))
        .route("/v1/locations", get(location_stream))
}

/// GET /v1/sessions/user — Passenger trip session.
async fn user_session(
    State(state): State<AppState>,
    Passenger(user_id): Passenger,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    state.service.ensure_user(user_id)?;
    info!(%user_id, "passenger session upgrade");
    let session = Arc::new(UserSession::new(state.service.clone(), user_id));
    let config = state.config.session;
    let shutdown = state.shutdown.clone();
    Ok(ws.on_upgrade(move |socket| run_session(socket, session, config, shutdown)))
}

/// GET /v1/sessions/driver — Driver trip session.
async fn driver_session(
    State(state): State<AppState>,
    Driver(driver_id): Driver,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    state.service.ensure_driver(driver_id)?;
    info!(%driver_id, "driver session upgrade");
    let session = Arc::new(DriverSession::new(state.service.clone(), driver_id));
    let config = state.config.session;
    let shutdown = state.shutdown.clone();
    Ok(ws.on_upgrade(move |socket| run_session(socket, session, config, shutdown)))
}

/// GET /v1/locations — Driver position stream.
async fn location_stream(
    State(state): State<AppState>,
    Driver(driver_id): Driver,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    state.service.ensure_driver(driver_id)?;
    let service = state.service.clone();
    let shutdown = state.shutdown.clone();
    Ok(ws.on_upgrade(move |socket| run_location_stream(socket, service, driver_id, shutdown)))
}
