//! Sticky last-known-good snapshot
//!
//! Keeps the last snapshot that had both a user and roles, so consumers can
//! keep rendering a trusted identity while a fresh lookup is in flight.
//!
//! # Read-through
//!
//! Consumers combine a fresh snapshot with the sticky one:
//!
//! - user: the fresh user, else the sticky user
//! - roles: the fresh roles when non-empty, else the sticky roles (only when
//!   the sticky user is the effective user)
//! - auth loading: only while fresh auth is loading *and* nothing is sticky
//!
//! The cache never expires on its own. It is cleared by an explicit sign-out.

use warden_types::{AuthSnapshot, AuthView};

/// Single-slot cache of the last trusted snapshot.
#[derive(Debug, Clone, Default)]
pub struct StickyCache {
    entry: Option<AuthSnapshot>,
}

impl StickyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a snapshot to the cache.
    ///
    /// Accepted only when it carries a user and a non-empty role set. Returns
    /// whether the entry was replaced.
    pub fn write(&mut self, snapshot: &AuthSnapshot) -> bool {
        if snapshot.user.is_none() || snapshot.roles.is_empty() {
            return false;
        }
        self.entry = Some(snapshot.clone());
        true
    }

    /// Last accepted snapshot, or `None` when nothing was accepted yet
    pub fn read(&self) -> Option<&AuthSnapshot> {
        self.entry.as_ref()
    }

    /// Whether the cache holds a user with roles
    pub fn is_trusted(&self) -> bool {
        self.entry.is_some()
    }

    /// Forget the cached snapshot
    pub fn clear(&mut self) {
        self.entry = None;
    }

    /// Apply the read-through rule to a fresh snapshot.
    pub fn effective_view(&self, fresh: &AuthSnapshot, version: u64) -> AuthView {
        let mut view = AuthView::from_snapshot(fresh, version);
        let Some(sticky) = self.entry.as_ref() else {
            return view;
        };

        if view.user.is_none() {
            view.user = sticky.user.clone();
            view.session = sticky.session.clone();
        }

        let same_user = match (&view.user, &sticky.user) {
            (Some(effective), Some(cached)) => effective.id == cached.id,
            _ => false,
        };
        if view.roles.is_empty() && same_user {
            view.roles = sticky.roles.clone();
            view.roles_loading = false;
        }

        view.auth_loading = fresh.auth_phase.is_loading() && sticky.user.is_none();
        view.is_authenticated = view.user.is_some();
        view
    }
}
