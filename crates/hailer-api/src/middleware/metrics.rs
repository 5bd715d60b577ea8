//! # Prometheus Metrics
//!
//! Request metrics recorded through the `metrics` facade. The binary
//! installs a Prometheus recorder; without one, recording is a no-op and
//! `/metrics` answers 503.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, histogram};

use crate::state::AppState;

/// Count requests and time them, labelled by matched route and status.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    counter!(
        "hailer_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.as_u16().to_string(),
    )
    .increment(1);
    histogram!("hailer_http_request_duration_seconds", "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());
    if status.is_server_error() || status.is_client_error() {
        counter!("hailer_http_errors_total").increment(1);
    }

    response
}

/// GET /metrics — Prometheus text exposition.
pub async fn render(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
