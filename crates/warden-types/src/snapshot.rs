//! Auth snapshot and consumer view types

use serde::{Deserialize, Serialize};

use crate::{IdentityUser, RoleSet, Session};

/// Loading phase of one half of the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPhase {
    /// Result not known yet
    Loading,
    /// Result settled
    Ready,
}

impl AuthPhase {
    /// Whether the phase is still loading
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Coarse state of the auth state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session
    Unauthenticated,
    /// Waiting on the first session lookup
    AuthLoading,
    /// Session known, roles still being resolved
    AuthenticatedRolesLoading,
    /// Session and roles known
    AuthenticatedReady,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::AuthLoading => write!(f, "auth_loading"),
            Self::AuthenticatedRolesLoading => write!(f, "authenticated_roles_loading"),
            Self::AuthenticatedReady => write!(f, "authenticated_ready"),
        }
    }
}

/// Who is logged in and what roles they hold, as tracked by the state machine.
///
/// `auth_phase` always settles no later than `roles_phase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub user: Option<IdentityUser>,
    pub session: Option<Session>,
    pub roles: RoleSet,
    pub auth_phase: AuthPhase,
    pub roles_phase: AuthPhase,
}

impl AuthSnapshot {
    /// Snapshot before the first session lookup settles
    pub fn loading() -> Self {
        Self {
            user: None,
            session: None,
            roles: RoleSet::new(),
            auth_phase: AuthPhase::Loading,
            roles_phase: AuthPhase::Loading,
        }
    }

    /// Settled snapshot with nobody logged in
    pub fn signed_out() -> Self {
        Self {
            user: None,
            session: None,
            roles: RoleSet::new(),
            auth_phase: AuthPhase::Ready,
            roles_phase: AuthPhase::Ready,
        }
    }

    /// Settled session whose roles are still being resolved
    pub fn authenticated(session: Session) -> Self {
        Self {
            user: Some(session.user.clone()),
            session: Some(session),
            roles: RoleSet::new(),
            auth_phase: AuthPhase::Ready,
            roles_phase: AuthPhase::Loading,
        }
    }

    /// Coarse machine state this snapshot corresponds to
    pub fn state(&self) -> AuthState {
        match (&self.user, self.auth_phase, self.roles_phase) {
            (_, AuthPhase::Loading, _) => AuthState::AuthLoading,
            (None, AuthPhase::Ready, _) => AuthState::Unauthenticated,
            (Some(_), AuthPhase::Ready, AuthPhase::Loading) => {
                AuthState::AuthenticatedRolesLoading
            }
            (Some(_), AuthPhase::Ready, AuthPhase::Ready) => AuthState::AuthenticatedReady,
        }
    }

    /// Roles never settle before the session does
    pub fn phases_consistent(&self) -> bool {
        !(self.auth_phase.is_loading() && !self.roles_phase.is_loading())
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

/// Read-only view handed to consumers after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthView {
    pub user: Option<IdentityUser>,
    pub session: Option<Session>,
    pub roles: RoleSet,
    pub auth_loading: bool,
    pub roles_loading: bool,
    pub is_authenticated: bool,
    /// Increments with every published mutation
    pub version: u64,
}

impl AuthView {
    /// View of a snapshot with no read-through applied
    pub fn from_snapshot(snapshot: &AuthSnapshot, version: u64) -> Self {
        Self {
            user: snapshot.user.clone(),
            session: snapshot.session.clone(),
            roles: snapshot.roles.clone(),
            auth_loading: snapshot.auth_phase.is_loading(),
            roles_loading: snapshot.roles_phase.is_loading(),
            is_authenticated: snapshot.user.is_some(),
            version,
        }
    }

    /// Check whether the viewed user holds `role`
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdentityUser, UserId};
    use chrono::Utc;

    fn session() -> Session {
        Session::new(
            IdentityUser::new(UserId::new(), "a@example.com"),
            "token",
            Utc::now(),
        )
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(AuthSnapshot::loading().state(), AuthState::AuthLoading);
        assert_eq!(AuthSnapshot::signed_out().state(), AuthState::Unauthenticated);

        let mut snap = AuthSnapshot::authenticated(session());
        assert_eq!(snap.state(), AuthState::AuthenticatedRolesLoading);

        snap.roles = RoleSet::default_user();
        snap.roles_phase = AuthPhase::Ready;
        assert_eq!(snap.state(), AuthState::AuthenticatedReady);
    }

    #[test]
    fn test_phase_consistency() {
        assert!(AuthSnapshot::loading().phases_consistent());
        assert!(AuthSnapshot::authenticated(session()).phases_consistent());

        let broken = AuthSnapshot {
            roles_phase: AuthPhase::Ready,
            ..AuthSnapshot::loading()
        };
        assert!(!broken.phases_consistent());
    }

    #[test]
    fn test_view_from_snapshot() {
        let snap = AuthSnapshot::authenticated(session());
        let view = AuthView::from_snapshot(&snap, 7);

        assert!(view.is_authenticated);
        assert!(!view.auth_loading);
        assert!(view.roles_loading);
        assert_eq!(view.version, 7);
        assert!(!view.has_role("user"));
    }
}
