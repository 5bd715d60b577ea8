//! # hailer-api — Dispatch Server
//!
//! Axum server exposing trip sessions to passengers and drivers, plus the
//! background [`TripDistributor`] that assigns requested trips.
//!
//! ## API Surface
//!
//! | Route                  | Kind      | Caller    |
//! |------------------------|-----------|-----------|
//! | `/v1/sessions/user`    | WebSocket | passenger |
//! | `/v1/sessions/driver`  | WebSocket | driver    |
//! | `/v1/locations`        | WebSocket | driver    |
//! | `/v1/feedback`         | POST      | passenger |
//! | `/v1/state`            | GET       | passenger |
//! | `/openapi.json`        | GET       | any       |
//! | `/health/*`, `/metrics`| GET       | no auth   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Session packets are JSON text frames tagged by `type` and stamped with a
//! `timestamp`; see `hailer-protocol`.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use hailer_dispatch::{DriverSelector, PlanarDistanceCost, TripDistributor};

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router.
///
/// Health checks and `/metrics` are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        validator: Arc::clone(&state.validator),
    };

    let api = Router::new()
        .merge(routes::sessions::router())
        .merge(routes::feedback::router())
        .merge(routes::state::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let operational = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(middleware::metrics::render))
        .with_state(state);

    Router::new()
        .merge(operational)
        .merge(api)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// The distributor wired to `state`'s repositories.
pub fn distributor(state: &AppState) -> TripDistributor {
    let repos = state.service.repositories();
    let selector = DriverSelector::new(
        Arc::clone(&repos.locations),
        Arc::clone(&repos.drivers),
        Arc::new(PlanarDistanceCost),
    );
    TripDistributor::new(
        Arc::clone(&repos.trips),
        Arc::clone(&repos.drivers),
        selector,
        state.config.distributor,
    )
}

/// Serve on `listener` with the distributor running beside it, until
/// `state.shutdown` is cancelled.
///
/// Returns once the server has drained and the distributor has stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let distributor = Arc::new(distributor(&state));
    let distributor_task = tokio::spawn(distributor.run(shutdown.clone()));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "hailer-api listening");
    }
    let signal = shutdown.clone();
    let result = axum::serve(listener, app(state))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await;

    shutdown.cancel();
    match distributor_task.await {
        Ok(()) => tracing::info!("distributor stopped"),
        Err(err) => tracing::error!(error = %err, "distributor task failed"),
    }
    result
}

/// Liveness check: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 503 once shutdown has begun.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ready")
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{send, TestApp};
    use axum::http::StatusCode;
    use serde_json::Value;

    #[tokio::test]
    async fn health_checks_need_no_token() {
        let app = TestApp::new();
        let (live, _) = send(&app, "GET", "/health/liveness", None, None).await;
        assert_eq!(live, StatusCode::OK);
        let (ready, _) = send(&app, "GET", "/health/readiness", None, None).await;
        assert_eq!(ready, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_fails_during_shutdown() {
        let app = TestApp::new();
        app.state.shutdown.cancel();
        let (ready, _) = send(&app, "GET", "/health/readiness", None, None).await;
        assert_eq!(ready, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_unavailable() {
        let app = TestApp::new();
        let (status, _) = send(&app, "GET", "/metrics", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn openapi_requires_token() {
        let app = TestApp::new();
        let (status, _) = send(&app, "GET", "/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = app.passenger(hailer_core::UserId::new());
        let (status, doc) = send(&app, "GET", "/openapi.json", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(doc["paths"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = TestApp::new();
        let token = app.passenger(hailer_core::UserId::new());
        let (status, _) = send(&app, "GET", "/v1/nowhere", Some(token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
