//! Refocus quiet period
//!
//! Identity providers tend to re-validate or refresh tokens when a tab comes
//! back into view, which shows up as a burst of redundant auth events. The
//! gate opens a short quiet period on every refocus signal; while it is open
//! and a trusted sticky snapshot exists, those events are ignored.
//!
//! The duration is a heuristic. A genuine auth change landing inside the
//! window is masked for at most that long.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;
use warden_types::HostSignal;

/// Tracks the quiet period opened by refocus signals.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    quiet_period: Duration,
    enabled: bool,
    quiet_until: Option<Instant>,
}

impl VisibilityGate {
    /// Gate opening a quiet period of `quiet_period` on refocus
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            enabled: true,
            quiet_until: None,
        }
    }

    /// Gate for hosts without visibility/focus signals. Never opens.
    pub fn disabled() -> Self {
        Self {
            quiet_period: Duration::ZERO,
            enabled: false,
            quiet_until: None,
        }
    }

    /// Configured quiet period
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Whether the gate reacts to signals at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feed a host signal. Returns whether a quiet period was (re)opened.
    pub fn on_signal(&mut self, signal: HostSignal) -> bool {
        if !self.enabled || !signal.is_refocus() {
            return false;
        }
        // reset, not extend
        self.quiet_until = Some(Instant::now() + self.quiet_period);
        trace!(?signal, quiet_period = ?self.quiet_period, "quiet period opened");
        true
    }

    /// Whether a quiet period is currently open
    pub fn in_quiet_period(&self) -> bool {
        self.quiet_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Time left in the current quiet period
    pub fn remaining(&self) -> Duration {
        self.quiet_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }
}
