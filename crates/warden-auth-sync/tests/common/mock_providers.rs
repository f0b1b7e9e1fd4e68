//! Mock collaborators for testing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};
use warden_auth_sync::{IdentityProvider, ProfileError, ProfileStore, ProviderError};
use warden_types::{AuthChange, AuthChangeEvent, IdentityUser, RoleSet, Session, UserId};

/// Build a fresh session for `user`
pub fn session_for(user: &IdentityUser) -> Session {
    Session::new(
        user.clone(),
        format!("access-{}", uuid::Uuid::new_v4()),
        Utc::now() + Duration::hours(1),
    )
}

/// Create a test user
pub fn test_user(name: &str) -> IdentityUser {
    IdentityUser::new(UserId::new(), format!("{name}@example.com"))
}

/// A gate that holds calls until released.
#[derive(Clone)]
struct Gate(Arc<Semaphore>);

impl Default for Gate {
    fn default() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }
}

impl Gate {
    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }

    fn release(&self) {
        self.0.add_permits(1);
    }
}

struct Account {
    password: String,
    user: IdentityUser,
}

/// In-memory identity provider for testing
pub struct MockIdentityProvider {
    accounts: DashMap<String, Account>,
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    get_session_error: Mutex<Option<ProviderError>>,
    get_session_gate: Mutex<Option<Gate>>,
    get_session_calls: AtomicUsize,
    sign_out_error: Mutex<Option<ProviderError>>,
    sign_out_hangs: AtomicBool,
    sign_out_calls: AtomicUsize,
    auto_confirm: AtomicBool,
    reset_requests: Mutex<Vec<(String, String)>>,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            accounts: DashMap::new(),
            current: Mutex::new(None),
            events,
            get_session_error: Mutex::new(None),
            get_session_gate: Mutex::new(None),
            get_session_calls: AtomicUsize::new(0),
            sign_out_error: Mutex::new(None),
            sign_out_hangs: AtomicBool::new(false),
            sign_out_calls: AtomicUsize::new(0),
            auto_confirm: AtomicBool::new(false),
            reset_requests: Mutex::new(Vec::new()),
        }
    }
}

#[allow(dead_code)]
impl MockIdentityProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provider that already holds a session for `user`
    pub fn with_session(user: &IdentityUser) -> Arc<Self> {
        let provider = Self::default();
        *provider.current.lock() = Some(session_for(user));
        Arc::new(provider)
    }

    /// Register an account that can sign in
    pub fn register(&self, email: &str, password: &str) -> IdentityUser {
        let user = IdentityUser::new(UserId::new(), email);
        self.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Current provider session
    pub fn current_session(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    /// Replace the provider session without notifying anyone
    pub fn set_session(&self, session: Option<Session>) {
        *self.current.lock() = session;
    }

    /// Push an auth change to subscribers
    pub fn push(&self, event: AuthChangeEvent, session: Option<Session>) {
        let _ = self.events.send(AuthChange::new(event, session));
    }

    /// Live receivers of the push channel
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Make `get_session` fail
    pub fn fail_get_session(&self, err: ProviderError) {
        *self.get_session_error.lock() = Some(err);
    }

    /// Hold `get_session` calls until [`release_get_session`](Self::release_get_session)
    pub fn hold_get_session(&self) {
        *self.get_session_gate.lock() = Some(Gate::default());
    }

    pub fn release_get_session(&self) {
        if let Some(gate) = self.get_session_gate.lock().as_ref() {
            gate.release();
        }
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    /// Make `sign_out` fail
    pub fn fail_sign_out(&self, err: ProviderError) {
        *self.sign_out_error.lock() = Some(err);
    }

    /// Make `sign_out` never complete
    pub fn hang_sign_out(&self) {
        self.sign_out_hangs.store(true, Ordering::SeqCst);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Log users in immediately on sign-up
    pub fn auto_confirm_sign_ups(&self) {
        self.auto_confirm.store(true, Ordering::SeqCst);
    }

    /// Password reset requests as (email, redirect_to)
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.reset_requests.lock().clone()
    }

    fn start_session(&self, user: &IdentityUser) {
        let session = session_for(user);
        *self.current.lock() = Some(session.clone());
        self.push(AuthChangeEvent::SignedIn, Some(session));
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.get_session_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(err) = self.get_session_error.lock().clone() {
            return Err(err);
        }
        Ok(self.current.lock().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let user = match self.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(ProviderError::InvalidCredentials),
        };
        self.start_session(&user);
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        if self.accounts.contains_key(email) {
            return Err(ProviderError::UserAlreadyExists);
        }
        let user = self.register(email, password);
        if self.auto_confirm.load(Ordering::SeqCst) {
            self.start_session(&user);
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.sign_out_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.sign_out_error.lock().clone() {
            return Err(err);
        }
        *self.current.lock() = None;
        self.push(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), ProviderError> {
        if !self.accounts.contains_key(email) {
            return Err(ProviderError::Provider("user not found".to_string()));
        }
        self.reset_requests
            .lock()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

/// In-memory profile store for testing
#[derive(Default, Clone)]
pub struct MockProfileStore {
    roles: Arc<DashMap<UserId, Result<RoleSet, ProfileError>>>,
    gates: Arc<DashMap<UserId, Gate>>,
    calls: Arc<DashMap<UserId, usize>>,
    completed: Arc<DashMap<UserId, usize>>,
}

#[allow(dead_code)]
impl MockProfileStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store roles for a user
    pub fn set_roles(&self, user_id: UserId, labels: &[&str]) {
        self.roles.insert(user_id, Ok(RoleSet::from_labels(labels)));
    }

    /// Make lookups for a user fail
    pub fn set_error(&self, user_id: UserId, err: ProfileError) {
        self.roles.insert(user_id, Err(err));
    }

    /// Hold lookups for a user until [`release`](Self::release)
    pub fn hold(&self, user_id: UserId) {
        self.gates.insert(user_id, Gate::default());
    }

    /// Let one held lookup for a user through
    pub fn release(&self, user_id: UserId) {
        if let Some(gate) = self.gates.get(&user_id) {
            gate.release();
        }
    }

    pub fn calls(&self, user_id: UserId) -> usize {
        self.calls.get(&user_id).map(|c| *c).unwrap_or(0)
    }

    pub fn completed(&self, user_id: UserId) -> usize {
        self.completed.get(&user_id).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_roles(&self, user_id: &UserId) -> Result<RoleSet, ProfileError> {
        *self.calls.entry(*user_id).or_insert(0) += 1;

        let gate = self.gates.get(user_id).map(|g| g.value().clone());
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let result = self
            .roles
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or(Err(ProfileError::NotFound));
        *self.completed.entry(*user_id).or_insert(0) += 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_profile_store_lookup() {
        let store = MockProfileStore::default();
        let user = UserId::new();

        assert_eq!(store.get_roles(&user).await, Err(ProfileError::NotFound));

        store.set_roles(user, &["admin"]);
        assert_eq!(
            store.get_roles(&user).await,
            Ok(RoleSet::from_labels(["admin"]))
        );
        assert_eq!(store.calls(user), 2);
        assert_eq!(store.completed(user), 2);
    }

    #[tokio::test]
    async fn test_mock_identity_sign_in_flow() {
        let provider = MockIdentityProvider::default();
        let user = provider.register("ops@example.com", "pw");
        let mut rx = provider.subscribe();

        assert_eq!(
            provider.sign_in_with_password("ops@example.com", "nope").await,
            Err(ProviderError::InvalidCredentials)
        );

        provider
            .sign_in_with_password("ops@example.com", "pw")
            .await
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.event, AuthChangeEvent::SignedIn);
        assert_eq!(change.session.unwrap().user_id(), user.id);

        provider.sign_out().await.unwrap();
        assert!(provider.get_session().await.unwrap().is_none());
    }
}
