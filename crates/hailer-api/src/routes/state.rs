//! # State API
//!
//! `GET /v1/state` answers with the same `StatusUpdate` packet a passenger
//! session would send for `GetStatus`, for callers without an open session.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use hailer_protocol::{SessionPacket, UserPacket};

use crate::auth::Passenger;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/state", get(get_state))
}

/// GET /v1/state — The caller's active trip as a `StatusUpdate` packet.
#[utoipa::path(
    get,
    path = "/v1/state",
    responses(
        (status = 200, description = "StatusUpdate packet; `trip` is null when there is no active trip"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not a passenger", body = crate::error::ErrorBody),
    ),
    tag = "state"
)]
pub(crate) async fn get_state(
    State(state): State<AppState>,
    Passenger(user_id): Passenger,
) -> Result<Json<UserPacket>, AppError> {
    state.service.ensure_user(user_id)?;
    let trip = state.service.active_trip_for_user(user_id)?;
    Ok(Json(UserPacket::status_update(trip)))
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, stops, TestApp};
    use axum::http::StatusCode;
    use hailer_core::UserId;
    use serde_json::Value;

    #[tokio::test]
    async fn no_trip_is_null_status_update() {
        let app = TestApp::new();
        let (status, json) = send(&app, "GET", "/v1/state", Some(app.passenger(UserId::new())), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "status_update");
        assert_eq!(json["trip"], Value::Null);
    }

    #[tokio::test]
    async fn reports_active_trip() {
        let app = TestApp::new();
        let user = UserId::new();
        let trip = app.state.service.request_trip(user, stops()).unwrap();
        let (status, json) = send(&app, "GET", "/v1/state", Some(app.passenger(user)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["trip"]["id"], serde_json::json!(trip.id.0));
        assert_eq!(json["trip"]["status"], "requested");
    }

    #[tokio::test]
    async fn requires_token() {
        let app = TestApp::new();
        let (status, json) = send(&app, "GET", "/v1/state", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
    }
}
