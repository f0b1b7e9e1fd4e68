//! Synchronizer metrics.
//!
//! Counters are recorded through the `metrics` facade and are no-ops unless
//! a recorder is installed by the host application.
//!
//! # Metrics
//!
//! - `warden_auth_events_total` - Provider push events by outcome (applied, suppressed, ignored)
//! - `warden_role_fetch_total` - Role lookups by outcome
//! - `warden_role_fetch_duration_seconds` - Role lookup latency
//! - `warden_role_results_discarded_total` - Role results dropped by the stale-response guard
//! - `warden_sign_out_provider_failures_total` - Provider sign-out failures after the local clear

use metrics::{counter, histogram};

/// Metric name for provider push events.
pub const AUTH_EVENTS_TOTAL: &str = "warden_auth_events_total";

/// Metric name for role lookups.
pub const ROLE_FETCH_TOTAL: &str = "warden_role_fetch_total";

/// Metric name for role lookup latency.
pub const ROLE_FETCH_DURATION_SECONDS: &str = "warden_role_fetch_duration_seconds";

/// Metric name for discarded role results.
pub const ROLE_RESULTS_DISCARDED_TOTAL: &str = "warden_role_results_discarded_total";

/// Metric name for provider sign-out failures.
pub const SIGN_OUT_PROVIDER_FAILURES_TOTAL: &str = "warden_sign_out_provider_failures_total";

/// What happened to a provider push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Suppressed,
    /// Dropped because it carried a session for a user signed out locally
    Ignored,
}

impl EventOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Suppressed => "suppressed",
            Self::Ignored => "ignored",
        }
    }
}

/// How a role lookup settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFetchOutcome {
    Ok,
    NotFound,
    Empty,
    Error,
}

impl RoleFetchOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Record a processed push event.
pub fn record_auth_event(outcome: EventOutcome) {
    counter!(AUTH_EVENTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record a settled role lookup.
pub fn record_role_fetch(outcome: RoleFetchOutcome, duration_seconds: f64) {
    counter!(ROLE_FETCH_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(ROLE_FETCH_DURATION_SECONDS).record(duration_seconds);
}

/// Record a role result dropped because the active user changed.
pub fn record_role_result_discarded() {
    counter!(ROLE_RESULTS_DISCARDED_TOTAL).increment(1);
}

/// Record a provider sign-out failure.
pub fn record_sign_out_failure() {
    counter!(SIGN_OUT_PROVIDER_FAILURES_TOTAL).increment(1);
}
