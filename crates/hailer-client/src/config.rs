//! # Client Configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `HAILER_URL` | `ws://127.0.0.1:8080` |
//! | `HAILER_TOKEN` | unset |
//!
//! Reconnect timing, queue capacity and the location interval are plain
//! fields with defaults.

use std::time::Duration;

use thiserror::Error;
use url::Url;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use hailer_core::{DriverId, UserId};

use crate::backoff::Backoff;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080";

/// Passenger session endpoint.
pub const USER_SESSION_PATH: &str = "/v1/sessions/user";
/// Driver session endpoint.
pub const DRIVER_SESSION_PATH: &str = "/v1/sessions/driver";
/// Driver location stream endpoint.
pub const LOCATION_PATH: &str = "/v1/locations";

/// Errors raised while building a [`ClientConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid server URL {value:?}: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("server URL must use ws or wss, got {0}")]
    UnsupportedScheme(String),
}

/// Bearer token presented on every connection. Never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `passenger:{uuid}[:{secret}]`.
    pub fn passenger(id: UserId, secret: Option<&str>) -> Self {
        Self::for_principal("passenger", id.as_uuid(), secret)
    }

    /// `driver:{uuid}[:{secret}]`.
    pub fn driver(id: DriverId, secret: Option<&str>) -> Self {
        Self::for_principal("driver", id.as_uuid(), secret)
    }

    fn for_principal(role: &str, principal: &Uuid, secret: Option<&str>) -> Self {
        match secret {
            Some(secret) => Self(format!("{role}:{principal}:{secret}")),
            None => Self(format!("{role}:{principal}")),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL; endpoint paths are joined onto it.
    pub base_url: Url,
    pub token: Option<BearerToken>,
    pub backoff: Backoff,
    /// Outbound queue capacity; overflow drops the oldest packet.
    pub queue_capacity: usize,
    /// How often the location reporter sends the newest sample.
    pub location_interval: Duration,
}

impl ClientConfig {
    /// Defaults for everything but the server URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidUrl {
            value: base_url.to_string(),
            source,
        })?;
        match base_url.scheme() {
            "ws" | "wss" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            base_url,
            token: None,
            backoff: Backoff::default(),
            queue_capacity: 20,
            location_interval: Duration::from_secs(5),
        })
    }

    /// Read `HAILER_URL` and `HAILER_TOKEN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("HAILER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let mut config = Self::new(&url)?;
        config.token = std::env::var("HAILER_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .map(BearerToken::new);
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(BearerToken::new(token));
        self
    }

    pub fn with_bearer(mut self, token: BearerToken) -> Self {
        self.token = Some(token);
        self
    }

    /// `path` resolved against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url
            .join(path)
            .map_err(|source| ConfigError::InvalidUrl {
                value: path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new(DEFAULT_URL).unwrap();
        assert_eq!(config.queue_capacity, 20);
        assert_eq!(config.location_interval, Duration::from_secs(5));
        assert_eq!(config.backoff, Backoff::default());
        assert!(config.token.is_none());
    }

    #[test]
    fn endpoints_join_onto_base() {
        let config = ClientConfig::new("wss://dispatch.example.com/").unwrap();
        assert_eq!(
            config.endpoint("/v1/sessions/user").unwrap().as_str(),
            "wss://dispatch.example.com/v1/sessions/user"
        );
    }

    #[test]
    fn rejects_http_scheme() {
        assert!(matches!(
            ClientConfig::new("http://dispatch.example.com"),
            Err(ConfigError::UnsupportedScheme(scheme)) if scheme == "http"
        ));
        assert!(matches!(
            ClientConfig::new("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn principal_tokens_carry_the_bare_uuid() {
        let user = UserId(Uuid::nil());
        assert_eq!(
            BearerToken::passenger(user, Some("s3cret")).expose(),
            "passenger:00000000-0000-0000-0000-000000000000:s3cret"
        );
        let driver = DriverId(Uuid::from_u128(7));
        assert_eq!(
            BearerToken::driver(driver, None).expose(),
            format!("driver:{}", driver.as_uuid())
        );
    }

    #[test]
    fn token_is_redacted() {
        let config = ClientConfig::new(DEFAULT_URL).unwrap().with_token("passenger:x:s3cret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("REDACTED"));
    }
}
