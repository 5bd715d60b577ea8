//! # Middleware
//!
//! - `metrics` — request counters and latency histograms recorded through
//!   the `metrics` facade, plus the `/metrics` render route.

pub mod metrics;
