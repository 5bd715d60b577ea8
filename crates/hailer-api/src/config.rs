//! # Server Configuration
//!
//! Read once at startup from environment variables. Invalid values fail
//! fast with a [`ConfigError`] naming the variable.
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | 8080 |
//! | `AUTH_SECRET` | unset (auth disabled) |
//! | `SESSION_POLL_MS` | 10 |
//! | `SESSION_QUEUE_CAPACITY` | 20 |
//! | `DISTRIBUTOR_POLL_MS` | 200 |
//! | `DISTRIBUTOR_ERROR_BACKOFF_MS` | 1000 |
//! | `RECONCILE_INTERVAL_SECS` | 30 |
//! | `RECONCILE_GRACE_SECS` | 60 |
//! | `FARE_BASE_CENTS`, `FARE_PER_KM_CENTS`, `FARE_PER_MINUTE_CENTS` | 250, 120, 30 |
//! | `AVERAGE_SPEED_KMH` | 30 |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use hailer_core::{CoreError, FareSchedule};
use hailer_dispatch::DistributorConfig;

/// Errors raised while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("fare schedule: {0}")]
    Fare(#[from] CoreError),
}

/// A shared secret, wiped from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for comparison only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

/// Per-connection session timing.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How often the outbound poller re-reads the caller's trip.
    pub poll_interval: Duration,
    /// Outbound queue capacity; overflow drops the oldest packet.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            queue_capacity: 20,
        }
    }
}

/// Application configuration.
///
/// Custom `Debug` redacts the auth secret.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Shared bearer secret. `None` disables secret checks; callers must
    /// still identify themselves with `{role}:{id}`.
    pub auth_secret: Option<SecretToken>,
    pub session: SessionConfig,
    pub distributor: DistributorConfig,
    pub fares: FareSchedule,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "[REDACTED]"))
            .field("session", &self.session)
            .field("distributor", &self.distributor)
            .field("fares", &self.fares)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_secret: None,
            session: SessionConfig::default(),
            distributor: DistributorConfig::default(),
            fares: FareSchedule::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read = Reader { lookup: &lookup };

        let session = SessionConfig {
            poll_interval: read.millis("SESSION_POLL_MS", defaults.session.poll_interval)?,
            queue_capacity: read.positive("SESSION_QUEUE_CAPACITY", defaults.session.queue_capacity)?,
        };
        let distributor = DistributorConfig {
            poll_interval: read.millis("DISTRIBUTOR_POLL_MS", defaults.distributor.poll_interval)?,
            error_backoff: read.millis(
                "DISTRIBUTOR_ERROR_BACKOFF_MS",
                defaults.distributor.error_backoff,
            )?,
            reconcile_interval: read.secs(
                "RECONCILE_INTERVAL_SECS",
                defaults.distributor.reconcile_interval,
            )?,
            reconcile_grace: read.secs("RECONCILE_GRACE_SECS", defaults.distributor.reconcile_grace)?,
        };
        let fares = FareSchedule {
            base_cents: read.parse("FARE_BASE_CENTS", defaults.fares.base_cents)?,
            per_km_cents: read.parse("FARE_PER_KM_CENTS", defaults.fares.per_km_cents)?,
            per_minute_cents: read.parse("FARE_PER_MINUTE_CENTS", defaults.fares.per_minute_cents)?,
            average_speed_kmh: read.parse("AVERAGE_SPEED_KMH", defaults.fares.average_speed_kmh)?,
        };
        fares.validate()?;

        Ok(Self {
            port: read.parse("PORT", defaults.port)?,
            auth_secret: lookup("AUTH_SECRET")
                .filter(|secret| !secret.is_empty())
                .map(SecretToken::new),
            session,
            distributor,
            fares,
        })
    }
}

struct Reader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Reader<'_> {
    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn positive(&self, name: &'static str, default: usize) -> Result<usize, ConfigError> {
        let value = self.parse(name, default)?;
        if value == 0 {
            return Err(ConfigError::Invalid {
                name,
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }

    fn millis(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let millis = self.positive(name, default.as_millis() as usize)?;
        Ok(Duration::from_millis(millis as u64))
    }

    fn secs(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = self.positive(name, default.as_secs() as usize)?;
        Ok(Duration::from_secs(secs as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_secret.is_none());
        assert_eq!(config.session.poll_interval, Duration::from_millis(10));
        assert_eq!(config.session.queue_capacity, 20);
        assert_eq!(config.distributor.poll_interval, Duration::from_millis(200));
        assert_eq!(config.distributor.error_backoff, Duration::from_secs(1));
    }

    #[test]
    fn reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "9090"),
            ("AUTH_SECRET", "s3cret"),
            ("SESSION_POLL_MS", "25"),
            ("FARE_BASE_CENTS", "400"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.auth_secret.unwrap().expose(), "s3cret");
        assert_eq!(config.session.poll_interval, Duration::from_millis(25));
        assert_eq!(config.fares.base_cents, 400);
    }

    #[test]
    fn rejects_garbage_port() {
        let err = from_pairs(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_zero_queue() {
        assert!(from_pairs(&[("SESSION_QUEUE_CAPACITY", "0")]).is_err());
    }

    #[test]
    fn rejects_bad_fare_schedule() {
        let err = from_pairs(&[("AVERAGE_SPEED_KMH", "-5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Fare(_)));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = from_pairs(&[("AUTH_SECRET", "hunter2")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!format!("{:?}", SecretToken::new("hunter2")).contains("hunter2"));
    }
}
