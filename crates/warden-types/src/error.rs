//! Common error types

use thiserror::Error;

/// Errors raised while constructing Warden domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WardenError {
    /// User id is not a valid UUID
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// Role label is empty or contains whitespace
    #[error("invalid role label: {0:?}")]
    InvalidRole(String),

    /// Unknown provider event name
    #[error("unknown auth event: {0}")]
    UnknownEvent(String),
}
