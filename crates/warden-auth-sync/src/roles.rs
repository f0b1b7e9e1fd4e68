//! Role resolution
//!
//! Wraps a [`ProfileStore`] with a fail-open policy: any lookup that does not
//! produce usable roles resolves to the least-privileged default role, so an
//! authenticated user always reaches a settled view.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};
use warden_types::{RoleSet, UserId};

use crate::error::ProfileError;
use crate::metrics::{record_role_fetch, RoleFetchOutcome};
use crate::provider::ProfileStore;

/// Resolves a user id to a role set. Never fails.
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn ProfileStore>,
    default_role: String,
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

impl RoleResolver {
    /// Create a resolver falling back to `default_role`
    pub fn new(store: Arc<dyn ProfileStore>, default_role: impl Into<String>) -> Self {
        Self {
            store,
            default_role: default_role.into(),
        }
    }

    /// The fallback role set
    pub fn fallback(&self) -> RoleSet {
        RoleSet::single(self.default_role.clone())
    }

    /// Fetch roles for `user_id`.
    ///
    /// Missing records, lookup failures and empty results all resolve to the
    /// fallback role set.
    #[instrument(skip(self), fields(user_id = %user_id), level = "debug")]
    pub async fn fetch(&self, user_id: &UserId) -> RoleSet {
        let started = Instant::now();
        let (roles, outcome) = match self.store.get_roles(user_id).await {
            Ok(roles) if roles.is_empty() => {
                debug!("no roles stored, using default role");
                (self.fallback(), RoleFetchOutcome::Empty)
            }
            Ok(roles) => (roles, RoleFetchOutcome::Ok),
            Err(ProfileError::NotFound) => {
                debug!("no profile record, using default role");
                (self.fallback(), RoleFetchOutcome::NotFound)
            }
            Err(err) => {
                warn!(error = %err, "role lookup failed, using default role");
                (self.fallback(), RoleFetchOutcome::Error)
            }
        };
        record_role_fetch(outcome, started.elapsed().as_secs_f64());
        roles
    }
}
