//! Synchronizer configuration

use std::time::Duration;

use thiserror::Error;
use warden_types::DEFAULT_ROLE;

/// Default quiet period opened by a refocus signal.
///
/// A heuristic, not a correctness guarantee: it bounds how long a genuine
/// auth change can be masked after the user returns to the page.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(2_000);

/// Default bound on the provider-side sign-out call.
pub const DEFAULT_SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required setting is missing
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    /// Setting has an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period opened on refocus.
    /// Default: 2 seconds
    pub quiet_period: Duration,

    /// Whether the host delivers visibility/focus signals at all.
    /// Default: true
    pub host_signals: bool,

    /// Upper bound on the provider sign-out call. The local state is
    /// already cleared by then; this only bounds how long `sign_out` awaits.
    /// Default: 5 seconds
    pub sign_out_timeout: Duration,

    /// Role handed out when the profile store has nothing usable.
    /// Default: "user"
    pub default_role: String,

    /// Public origin of the dashboard, used for the password-reset redirect.
    /// Default: "http://localhost:3000"
    pub site_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            host_signals: true,
            sign_out_timeout: DEFAULT_SIGN_OUT_TIMEOUT,
            default_role: DEFAULT_ROLE.to_string(),
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl SyncConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables (and `.env`, if present).
    ///
    /// Unset variables fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = lookup("WARDEN_QUIET_PERIOD_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("WARDEN_QUIET_PERIOD_MS"))?;
            config.quiet_period = Duration::from_millis(ms);
        }

        if let Some(flag) = lookup("WARDEN_HOST_SIGNALS") {
            config.host_signals = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::Invalid("WARDEN_HOST_SIGNALS")),
            };
        }

        if let Some(ms) = lookup("WARDEN_SIGN_OUT_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("WARDEN_SIGN_OUT_TIMEOUT_MS"))?;
            config.sign_out_timeout = Duration::from_millis(ms);
        }

        if let Some(role) = lookup("WARDEN_DEFAULT_ROLE") {
            config.default_role = role.trim().to_string();
        }

        if let Some(url) = lookup("WARDEN_SITE_URL") {
            config.site_url = url.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_role.is_empty() || self.default_role.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid("WARDEN_DEFAULT_ROLE"));
        }
        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(ConfigError::Invalid("WARDEN_SITE_URL"));
        }
        Ok(())
    }

    /// Where password-reset emails send the user back to
    pub fn reset_password_redirect(&self) -> String {
        format!("{}/reset-password", self.site_url.trim_end_matches('/'))
    }

    /// Set the quiet period.
    #[must_use]
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = period;
        self
    }

    /// Enable or disable host visibility/focus signals.
    #[must_use]
    pub fn with_host_signals(mut self, enabled: bool) -> Self {
        self.host_signals = enabled;
        self
    }

    /// Set the provider sign-out timeout.
    #[must_use]
    pub fn with_sign_out_timeout(mut self, timeout: Duration) -> Self {
        self.sign_out_timeout = timeout;
        self
    }

    /// Set the fail-open default role.
    #[must_use]
    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    /// Set the site URL.
    #[must_use]
    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }
}
