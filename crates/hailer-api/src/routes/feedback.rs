//! # Feedback API
//!
//! A passenger rates the driver of one of their own ended trips, once.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use hailer_core::TripId;
use hailer_protocol::Feedback;

use crate::auth::Passenger;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 1000;

/// Rating for an ended trip.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub trip_id: Uuid,
    /// 1 to 5.
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Validate for FeedbackRequest {
    fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err(format!("rating must be between 1 and 5, got {}", self.rating));
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_CHARS {
                return Err(format!("comment exceeds {MAX_COMMENT_CHARS} characters"));
            }
        }
        Ok(())
    }
}

/// The rated trip.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub trip_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub rating: u8,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/feedback", post(provide_feedback))
}

/// POST /v1/feedback — Rate the driver of an ended trip.
#[utoipa::path(
    post,
    path = "/v1/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback recorded", body = FeedbackResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Not a passenger, or not the caller's trip", body = crate::error::ErrorBody),
        (status = 404, description = "Trip not found", body = crate::error::ErrorBody),
        (status = 409, description = "Trip not ended, or already rated", body = crate::error::ErrorBody),
        (status = 422, description = "Rating out of range", body = crate::error::ErrorBody),
    ),
    tag = "feedback"
)]
pub(crate) async fn provide_feedback(
    State(state): State<AppState>,
    Passenger(user_id): Passenger,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let feedback = Feedback {
        trip_id: TripId(req.trip_id),
        rating: req.rating,
        comment: req.comment,
    };
    let trip = state.service.provide_feedback(user_id, &feedback)?;
    Ok(Json(FeedbackResponse {
        trip_id: trip.id.0,
        driver_id: trip.driver_id.map(|id| id.0),
        rating: feedback.rating,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ended_trip, send, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn rates_ended_trip_once() {
        let app = TestApp::new();
        let (user, driver, trip) = ended_trip(&app.state);

        let body = json!({"trip_id": trip.id.0, "rating": 4, "comment": "smooth"});
        let (status, json) = send(&app, "POST", "/v1/feedback", Some(app.passenger(user)), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rating"], 4);
        assert_eq!(json["driver_id"], json!(driver.0));

        let rated = app.state.service.repositories().drivers.get_driver(driver).unwrap().unwrap();
        assert_eq!(rated.rating_count, 1);
        assert_eq!(rated.rating, 4.0);

        let (again, err) = send(&app, "POST", "/v1/feedback", Some(app.passenger(user)), Some(body)).await;
        assert_eq!(again, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn rejects_out_of_range_rating() {
        let app = TestApp::new();
        let (user, _, trip) = ended_trip(&app.state);
        let body = json!({"trip_id": trip.id.0, "rating": 6});
        let (status, err) = send(&app, "POST", "/v1/feedback", Some(app.passenger(user)), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn another_passengers_trip_is_forbidden() {
        let app = TestApp::new();
        let (_, _, trip) = ended_trip(&app.state);
        let stranger = hailer_core::UserId::new();
        let body = json!({"trip_id": trip.id.0, "rating": 5});
        let (status, _) = send(&app, "POST", "/v1/feedback", Some(app.passenger(stranger)), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_trip_is_404() {
        let app = TestApp::new();
        let body = json!({"trip_id": Uuid::new_v4(), "rating": 5});
        let user = hailer_core::UserId::new();
        let (status, _) = send(&app, "POST", "/v1/feedback", Some(app.passenger(user)), Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn drivers_cannot_rate() {
        let app = TestApp::new();
        let body = json!({"trip_id": Uuid::new_v4(), "rating": 5});
        let driver = hailer_core::DriverId::new();
        let (status, _) = send(&app, "POST", "/v1/feedback", Some(app.driver(driver)), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = TestApp::new();
        let user = hailer_core::UserId::new();
        let body = json!({"rating": "five"});
        let (status, err) = send(&app, "POST", "/v1/feedback", Some(app.passenger(user)), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "BAD_REQUEST");
    }

    #[test]
    fn validate_limits_comment_length() {
        let req = FeedbackRequest {
            trip_id: Uuid::new_v4(),
            rating: 3,
            comment: Some("x".repeat(MAX_COMMENT_CHARS + 1)),
        };
        assert!(req.validate().is_err());
    }
}
