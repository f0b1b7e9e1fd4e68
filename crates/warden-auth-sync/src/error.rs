//! Auth errors
//!
//! Error types for the synchronizer and the collaborators it drives. Only
//! [`AuthError`] ever reaches consumers; profile lookups and background
//! provider calls are logged and degraded instead.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by the identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Wrong email/password combination
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Sign-up for an email that is already registered
    #[error("user already exists")]
    UserAlreadyExists,

    /// Sign-in before the confirmation link was followed
    #[error("email not confirmed")]
    EmailNotConfirmed,

    /// Provider throttled the request
    #[error("rate limited")]
    RateLimited,

    /// Network failure reaching the provider
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// Any other provider-side failure
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Returns true if the failure is likely to go away on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Network(_) | Self::Timeout(_)
        )
    }

    /// Stable error code for inline form rendering
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Self::EmailNotConfirmed => "EMAIL_NOT_CONFIRMED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

/// Failures reported by the profile store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No profile record for the user
    #[error("profile not found")]
    NotFound,

    /// Any other lookup failure
    #[error("profile lookup failed: {0}")]
    Other(String),
}

/// Errors surfaced by the consumer API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The identity provider rejected a user-initiated operation
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Input rejected before reaching the provider
    #[error("validation failed: {0}")]
    Validation(String),

    /// The state machine has been disposed
    #[error("auth state machine disposed")]
    Disposed,
}

impl AuthError {
    /// Stable error code for inline form rendering
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Provider(err) => err.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Disposed => "DISPOSED",
        }
    }
}

/// Result alias for consumer operations
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_provider_errors() {
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(3)).is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(!ProviderError::InvalidCredentials.is_transient());
        assert!(!ProviderError::Provider("boom".into()).is_transient());
    }

    #[test]
    fn test_auth_error_codes() {
        let err: AuthError = ProviderError::InvalidCredentials.into();
        assert_eq!(err.error_code(), "INVALID_CREDENTIALS");
        assert_eq!(err.to_string(), "invalid credentials");

        assert_eq!(
            AuthError::Validation("email".into()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AuthError::Disposed.error_code(), "DISPOSED");
    }
}
