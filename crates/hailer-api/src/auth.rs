//! # Authentication
//!
//! Bearer-token middleware. Every request except the health checks must
//! carry a token identifying the caller:
//!
//! ```text
//! Authorization: Bearer {role}:{principal_id}:{secret}
//! Authorization: Bearer {role}:{principal_id}          (secret checks disabled)
//! ```
//!
//! `role` is `passenger` or `driver`. Token issuance is external; a
//! [`TokenValidator`] turns the presented token into a [`CallerIdentity`]
//! which the middleware injects into request extensions. A failed check
//! answers 401 before any WebSocket upgrade happens.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use hailer_core::{DriverId, UserId};

use crate::config::SecretToken;
use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Who is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passenger,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Driver => "driver",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller, available to handlers as an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// The passenger or driver id, depending on `role`.
    pub principal: Uuid,
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has `role`. Returns 403 otherwise.
pub fn require_role(caller: &CallerIdentity, role: Role) -> Result<(), AppError> {
    if caller.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            role.as_str(),
            caller.role.as_str()
        )))
    }
}

/// Extractor for routes only passengers may call.
#[derive(Debug, Clone, Copy)]
pub struct Passenger(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Passenger {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = CallerIdentity::from_request_parts(parts, state).await?;
        require_role(&caller, Role::Passenger)?;
        Ok(Self(UserId(caller.principal)))
    }
}

/// Extractor for routes only drivers may call.
#[derive(Debug, Clone, Copy)]
pub struct Driver(pub DriverId);

impl<S: Send + Sync> FromRequestParts<S> for Driver {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = CallerIdentity::from_request_parts(parts, state).await?;
        require_role(&caller, Role::Driver)?;
        Ok(Self(DriverId(caller.principal)))
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Turns a presented bearer token into an identity.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<CallerIdentity, String>;
}

/// Validates `{role}:{id}:{secret}` tokens against one shared secret.
#[derive(Clone)]
pub struct StaticTokenValidator {
    secret: Option<SecretToken>,
}

impl StaticTokenValidator {
    /// `None` accepts any well-formed `{role}:{id}` token.
    pub fn new(secret: Option<SecretToken>) -> Self {
        Self { secret }
    }
}

impl std::fmt::Debug for StaticTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenValidator")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate(&self, token: &str) -> Result<CallerIdentity, String> {
        parse_bearer_token(token, self.secret.as_ref().map(SecretToken::expose))
    }
}

/// Constant-time comparison of secrets.
///
/// When lengths differ, performs a dummy comparison so timing does not
/// reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{principal_id}[:{secret}]`.
///
/// With `expected_secret` set, the secret segment is required and compared
/// in constant time.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let (role_str, id_str, secret) = match parts.as_slice() {
        [role, id] => (*role, *id, None),
        [role, id, secret] => (*role, *id, Some(*secret)),
        _ => return Err("invalid token format, expected {role}:{id}:{secret}".into()),
    };

    if let Some(expected) = expected_secret {
        match secret {
            Some(secret) if constant_time_token_eq(secret, expected) => {}
            _ => return Err("invalid bearer token".into()),
        }
    }

    let role = match role_str {
        "passenger" => Role::Passenger,
        "driver" => Role::Driver,
        other => return Err(format!("unknown role: {other}")),
    };
    let principal = id_str
        .parse::<Uuid>()
        .map_err(|e| format!("invalid principal id: {e}"))?;

    Ok(CallerIdentity { role, principal })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validator injected into request extensions.
#[derive(Clone)]
pub struct AuthConfig {
    pub validator: Arc<dyn TokenValidator>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").finish_non_exhaustive()
    }
}

/// Validate the bearer token and inject the caller's [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<AuthConfig>().cloned() else {
        tracing::error!("auth middleware installed without AuthConfig");
        return AppError::Internal("authentication not configured".into()).into_response();
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => match header_value.strip_prefix("Bearer ") {
            Some(provided) => match config.validator.validate(provided) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            },
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
