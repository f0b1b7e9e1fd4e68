//! Provider push events and host signals

use serde::{Deserialize, Serialize};

use crate::{Session, WardenError};

/// Kind of auth change pushed by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthChangeEvent {
    /// Wire name used by the provider
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl std::fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthChangeEvent {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INITIAL_SESSION" => Ok(Self::InitialSession),
            "SIGNED_IN" => Ok(Self::SignedIn),
            "SIGNED_OUT" => Ok(Self::SignedOut),
            "TOKEN_REFRESHED" => Ok(Self::TokenRefreshed),
            "USER_UPDATED" => Ok(Self::UserUpdated),
            "PASSWORD_RECOVERY" => Ok(Self::PasswordRecovery),
            _ => Err(WardenError::UnknownEvent(s.to_string())),
        }
    }
}

/// A provider push notification: what happened and the session afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Page visibility as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Refocus-related signal delivered by the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSignal {
    /// Tab visibility changed
    VisibilityChanged(Visibility),
    /// Window gained focus
    WindowFocused,
}

impl HostSignal {
    /// Whether the signal marks the user coming back to the page
    pub const fn is_refocus(&self) -> bool {
        matches!(
            self,
            Self::VisibilityChanged(Visibility::Visible) | Self::WindowFocused
        )
    }
}
