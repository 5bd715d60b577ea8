//! # Application State
//!
//! Shared state for the Axum application, passed to handlers via the
//! `State` extractor. Everything here is cheap to clone; the repositories
//! behind [`TripService`] are the only shared mutable resource.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;

use hailer_dispatch::{LogNotifier, Notifier, Repositories, TripService};

use crate::auth::{StaticTokenValidator, TokenValidator};
use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: TripService,
    pub config: Arc<AppConfig>,
    pub validator: Arc<dyn TokenValidator>,
    /// Renders `/metrics`. `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Cancelled when the server starts shutting down. Sessions and the
    /// distributor observe it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// In-memory state with the logging notifier and a static validator
    /// built from `config.auth_secret`.
    pub fn new(config: AppConfig) -> Self {
        Self::with_parts(config, Repositories::in_memory(), Arc::new(LogNotifier))
    }

    /// State over caller-supplied repositories and notifier.
    pub fn with_parts(
        config: AppConfig,
        repos: Repositories,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let service = TripService::new(repos, notifier, config.fares);
        let validator = Arc::new(StaticTokenValidator::new(config.auth_secret.clone()));
        Self {
            service,
            config: Arc::new(config),
            validator,
            metrics: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Attach the Prometheus handle served at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Replace the token validator.
    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.validator = validator;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
