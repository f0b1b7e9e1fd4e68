//! Collaborator interfaces
//!
//! The synchronizer does not talk to any concrete identity provider or
//! profile database. Hosts plug them in through these traits.

use async_trait::async_trait;
use tokio::sync::broadcast;
use warden_types::{AuthChange, RoleSet, Session, UserId};

use crate::error::{ProfileError, ProviderError};

/// Identity provider client trait
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, or `None` when nobody is logged in
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Subscribe to pushed auth changes.
    ///
    /// Changes are delivered in the order the provider emits them. Dropping
    /// the receiver ends the subscription.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    /// Sign in with email and password
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<(), ProviderError>;

    /// Register a new account
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), ProviderError>;

    /// End the provider session
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Send a password reset email that links back to `redirect_to`
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError>;
}

/// User-role store trait
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Role labels stored for a user
    async fn get_roles(&self, user_id: &UserId) -> Result<RoleSet, ProfileError>;
}
