//! Auth state machine
//!
//! Single writer of the published [`AuthSnapshot`]. It merges three
//! independent sources (the initial session lookup, provider push events and
//! host refocus signals) into one monotonic view of who is logged in and
//! which roles they hold.
//!
//! ```text
//!                 start()
//!   AuthLoading ───────────► Unauthenticated ◄──────────────┐
//!        │      no session         │ sign-in / push         │ sign-out /
//!        │ session                 ▼                        │ null session
//!        └──────────────► AuthenticatedRolesLoading ────────┤
//!                                  │ role fetch settles     │
//!                                  ▼                        │
//!                          AuthenticatedReady ──────────────┘
//! ```
//!
//! # Concurrency
//!
//! Push events are consumed by one task, in delivery order. Role fetches run
//! on their own tasks and are never cancelled individually; every result is
//! tagged with the user id it was issued for and dropped if that user is no
//! longer the active one when it lands.
//!
//! Subscribers are called synchronously after each published mutation, on
//! whichever task performed it. Delivery is serialized and ordered by view
//! version: a view superseded before it reaches the listeners is skipped, so
//! the last view a subscriber sees is always the current one.
//!
//! After a local sign-out the provider may still hold the session (its
//! sign-out call failed or timed out). Pushes carrying that user's session
//! are ignored until a `SIGNED_IN` event or a new sign-in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};
use warden_types::{
    AuthChange, AuthChangeEvent, AuthPhase, AuthSnapshot, AuthState, AuthView, HostSignal,
    RoleSet, Session, UserId,
};

use crate::config::{ConfigError, SyncConfig};
use crate::error::{AuthError, ProviderError, Result};
use crate::metrics::{
    record_auth_event, record_role_result_discarded, record_sign_out_failure, EventOutcome,
};
use crate::provider::{IdentityProvider, ProfileStore};
use crate::roles::RoleResolver;
use crate::sticky::StickyCache;
use crate::subscription::{Listeners, Subscription};
use crate::visibility::VisibilityGate;

/// Builder for [`AuthStateMachine`].
pub struct AuthStateMachineBuilder {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    config: SyncConfig,
}

impl AuthStateMachineBuilder {
    /// Use `config` instead of the defaults
    #[must_use]
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the state machine. Nothing runs until [`AuthStateMachine::start`].
    pub fn build(self) -> std::result::Result<AuthStateMachine, ConfigError> {
        self.config.validate()?;
        Ok(AuthStateMachine::new(self.identity, self.profiles, self.config))
    }
}

/// Mutable state, guarded by one lock.
struct State {
    snapshot: AuthSnapshot,
    sticky: StickyCache,
    gate: VisibilityGate,
    /// Last view handed to consumers
    view: AuthView,
    /// Bumped whenever a session result is applied
    session_epoch: u64,
    /// User cleared by `sign_out`. Pushes for them are ignored until they
    /// sign in again.
    signed_out_user: Option<UserId>,
}

#[derive(Default)]
struct Tasks {
    events: Option<JoinHandle<()>>,
    role_fetches: JoinSet<()>,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    resolver: RoleResolver,
    config: SyncConfig,
    state: Mutex<State>,
    listeners: Arc<Mutex<Listeners>>,
    /// Version of the last view handed to listeners
    delivered: Mutex<u64>,
    view_tx: Mutex<Option<watch::Sender<AuthView>>>,
    tasks: Mutex<Tasks>,
    disposed: AtomicBool,
}

/// Session/role authorization synchronizer.
///
/// Cloning yields another handle to the same machine. The machine is
/// disposed when [`dispose`](Self::dispose) is called or the last handle
/// is dropped.
#[derive(Clone)]
pub struct AuthStateMachine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStateMachine")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl AuthStateMachine {
    /// Start building a machine over the given collaborators
    pub fn builder(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> AuthStateMachineBuilder {
        AuthStateMachineBuilder {
            identity,
            profiles,
            config: SyncConfig::default(),
        }
    }

    /// Create a machine without validating `config`
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        config: SyncConfig,
    ) -> Self {
        let gate = if config.host_signals {
            VisibilityGate::new(config.quiet_period)
        } else {
            VisibilityGate::disabled()
        };
        let snapshot = AuthSnapshot::loading();
        let view = AuthView::from_snapshot(&snapshot, 0);
        let (view_tx, _) = watch::channel(view.clone());

        let inner = Inner {
            identity,
            resolver: RoleResolver::new(profiles, config.default_role.clone()),
            config,
            state: Mutex::new(State {
                snapshot,
                sticky: StickyCache::new(),
                gate,
                view,
                session_epoch: 0,
                signed_out_user: None,
            }),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            delivered: Mutex::new(0),
            view_tx: Mutex::new(Some(view_tx)),
            tasks: Mutex::new(Tasks::default()),
            disposed: AtomicBool::new(false),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Subscribe to provider events and load the initial session.
    ///
    /// Returns once the session lookup has settled; `auth_loading` is false
    /// by then whatever the outcome. Role resolution continues in the
    /// background. Calling `start` again is a no-op.
    #[instrument(skip(self), level = "debug")]
    pub async fn start(&self) -> Result<()> {
        self.ensure_live()?;
        {
            let mut tasks = self.inner.tasks.lock();
            if tasks.events.is_some() {
                return Ok(());
            }
            let rx = self.inner.identity.subscribe();
            tasks.events = Some(tokio::spawn(run_event_loop(
                Arc::downgrade(&self.inner),
                rx,
            )));
        }

        let epoch = self.inner.state.lock().session_epoch;
        let session = match self.inner.identity.get_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "initial session lookup failed, treating as signed out");
                None
            }
        };
        self.inner.apply_initial_session(epoch, session);
        Ok(())
    }

    /// Stop consuming events, abort in-flight role fetches and drop all
    /// subscribers. Reads keep returning the last snapshot.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("disposing auth state machine");
        self.inner.shutdown();
    }

    /// Whether [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current view, with the sticky read-through applied.
    ///
    /// The read-through keeps a trusted user visible across a null session
    /// that did not come from a sign-out (for example a `USER_UPDATED` push
    /// without a session). In that case the view still reports the sticky
    /// user while [`state`](Self::state) reports `Unauthenticated`.
    pub fn get_snapshot(&self) -> AuthView {
        self.inner.state.lock().view.clone()
    }

    /// Current snapshot as tracked by the machine, without read-through
    pub fn raw_snapshot(&self) -> AuthSnapshot {
        self.inner.state.lock().snapshot.clone()
    }

    /// Current machine state, computed from the raw snapshot
    pub fn state(&self) -> AuthState {
        self.inner.state.lock().snapshot.state()
    }

    /// Last trusted snapshot, if any
    pub fn sticky_snapshot(&self) -> Option<AuthSnapshot> {
        self.inner.state.lock().sticky.read().cloned()
    }

    /// Whether a refocus quiet period is open
    pub fn in_quiet_period(&self) -> bool {
        self.inner.state.lock().gate.in_quiet_period()
    }

    /// Active configuration
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a callback invoked with the new view after every mutation.
    ///
    /// Callbacks must not block: other mutations wait for delivery to finish.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthView) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.lock().add(Arc::new(callback));
        Subscription::new(id, Arc::downgrade(&self.inner.listeners))
    }

    /// Channel that always holds the latest view
    pub fn watch(&self) -> Result<watch::Receiver<AuthView>> {
        self.inner
            .view_tx
            .lock()
            .as_ref()
            .map(watch::Sender::subscribe)
            .ok_or(AuthError::Disposed)
    }

    /// Wait until the view satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<AuthView>
    where
        F: FnMut(&AuthView) -> bool,
    {
        let mut rx = self.watch()?;
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| AuthError::Disposed)?;
        Ok(view.clone())
    }

    // =========================================================================
    // Host signals
    // =========================================================================

    /// Feed a visibility or focus signal from the host.
    pub fn notify_host_signal(&self, signal: HostSignal) {
        if self.is_disposed() {
            return;
        }
        if self.inner.state.lock().gate.on_signal(signal) {
            debug!(?signal, "refocus quiet period opened");
        }
    }

    // =========================================================================
    // Consumer operations
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// Provider failures are returned so the form can render them. On success
    /// the new session is applied right away.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        self.ensure_live()?;
        validate_email(email)?;
        validate_password(password)?;

        self.inner
            .identity
            .sign_in_with_password(email.trim(), password)
            .await?;
        info!("signed in");
        self.sync_session(AuthChangeEvent::SignedIn).await;
        Ok(())
    }

    /// Register a new account.
    ///
    /// If the provider logs the user in immediately, the session is applied.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        self.ensure_live()?;
        validate_email(email)?;
        validate_password(password)?;

        self.inner.identity.sign_up(email.trim(), password).await?;
        info!("signed up");
        self.sync_session(AuthChangeEvent::SignedIn).await;
        Ok(())
    }

    /// Sign out.
    ///
    /// Local state is cleared first and unconditionally. The provider call
    /// runs afterwards; its failure or timeout is logged, never returned,
    /// and later pushes of the old session do not restore it.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.ensure_live()?;
        self.inner.commit(|state| {
            let effective = state
                .snapshot
                .user
                .as_ref()
                .or_else(|| state.sticky.read().and_then(|s| s.user.as_ref()))
                .map(|user| user.id);
            state.signed_out_user = effective;
            state.sticky.clear();
            state.snapshot = AuthSnapshot::signed_out();
            state.session_epoch += 1;
            Some(())
        });
        info!("signed out locally");

        let timeout = self.inner.config.sign_out_timeout;
        let outcome = tokio::time::timeout(timeout, self.inner.identity.sign_out()).await;
        let err = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_) => ProviderError::Timeout(timeout),
        };
        warn!(error = %err, "provider sign-out failed, local state stays signed out");
        record_sign_out_failure();
        Ok(())
    }

    /// Send a password-reset email linking back to the dashboard.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.ensure_live()?;
        validate_email(email)?;

        let redirect_to = self.inner.config.reset_password_redirect();
        self.inner
            .identity
            .reset_password_for_email(email.trim(), &redirect_to)
            .await?;
        Ok(())
    }

    /// Re-resolve roles for the current user.
    ///
    /// Only the roles half of the snapshot changes. Returns the resolved
    /// roles, or an empty set when nobody is logged in.
    #[instrument(skip(self))]
    pub async fn refresh_roles(&self) -> Result<RoleSet> {
        self.ensure_live()?;
        let user_id = self.inner.commit(|state| {
            let user_id = state.snapshot.user.as_ref()?.id;
            state.snapshot.roles_phase = AuthPhase::Loading;
            Some(user_id)
        });
        let Some(user_id) = user_id else {
            return Ok(RoleSet::new());
        };

        let roles = self.inner.resolver.fetch(&user_id).await;
        self.inner.apply_roles(user_id, roles.clone());
        Ok(roles)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(AuthError::Disposed);
        }
        Ok(())
    }

    /// Re-read the provider session after a user-initiated change.
    async fn sync_session(&self, event: AuthChangeEvent) {
        match self.inner.identity.get_session().await {
            Ok(Some(session)) => self.inner.apply_signed_in(session),
            Ok(None) => debug!(%event, "no session yet, waiting for provider push"),
            Err(err) => warn!(%event, error = %err, "session lookup failed, waiting for provider push"),
        }
    }
}

impl Inner {
    /// Run `mutate` under the state lock and publish if the view changed.
    ///
    /// Returns `mutate`'s result; `None` means nothing was touched.
    fn commit<R>(&self, mutate: impl FnOnce(&mut State) -> Option<R>) -> Option<R> {
        if self.disposed.load(Ordering::SeqCst) {
            return None;
        }

        let (result, view) = {
            let mut state = self.state.lock();
            let result = mutate(&mut state)?;
            debug_assert!(state.snapshot.phases_consistent());

            let snapshot = state.snapshot.clone();
            state.sticky.write(&snapshot);

            let next = state
                .sticky
                .effective_view(&state.snapshot, state.view.version + 1);
            if same_view(&next, &state.view) {
                return Some(result);
            }
            state.view = next.clone();
            if let Some(tx) = self.view_tx.lock().as_ref() {
                tx.send_replace(next.clone());
            }
            (result, next)
        };

        // Concurrent commits race to this point; a view older than the last
        // delivered one is dropped so listeners only ever move forward.
        let mut delivered = self.delivered.lock();
        if view.version <= *delivered {
            return Some(result);
        }
        *delivered = view.version;
        let listeners = self.listeners.lock().snapshot();
        for listener in listeners {
            listener(&view);
        }
        Some(result)
    }

    fn apply_initial_session(self: &Arc<Self>, epoch: u64, session: Option<Session>) {
        let fetch = self.commit(|state| {
            if state.session_epoch != epoch {
                debug!("initial session superseded by a pushed event");
                return None;
            }
            Some(apply_session(state, session))
        });
        if let Some(Some(user_id)) = fetch {
            self.spawn_role_fetch(user_id);
        }
    }

    /// Apply the session re-read after a user-initiated sign-in.
    fn apply_signed_in(self: &Arc<Self>, session: Session) {
        let fetch = self.commit(|state| {
            state.signed_out_user = None;
            Some(apply_session(state, Some(session)))
        });
        if let Some(Some(user_id)) = fetch {
            self.spawn_role_fetch(user_id);
        }
    }

    fn handle_change(self: &Arc<Self>, change: AuthChange) {
        let AuthChange { event, session } = change;
        let user_id = session.as_ref().map(Session::user_id);

        let fetch = self.commit(|state| {
            if state.gate.in_quiet_period() && state.sticky.is_trusted() {
                debug!(%event, "auth event suppressed during quiet period");
                record_auth_event(EventOutcome::Suppressed);
                return None;
            }
            if event == AuthChangeEvent::SignedIn {
                state.signed_out_user = None;
            } else if user_id.is_some() && user_id == state.signed_out_user {
                // provider still holds a session we already cleared locally
                debug!(%event, ?user_id, "auth event for signed-out user ignored");
                record_auth_event(EventOutcome::Ignored);
                return None;
            }

            debug!(%event, ?user_id, "applying auth event");
            record_auth_event(EventOutcome::Applied);
            if event == AuthChangeEvent::SignedOut {
                state.sticky.clear();
            }
            Some(apply_session(state, session))
        });
        if let Some(Some(user_id)) = fetch {
            self.spawn_role_fetch(user_id);
        }
    }

    fn apply_roles(&self, user_id: UserId, roles: RoleSet) {
        self.commit(|state| {
            let current = state.snapshot.user.as_ref().map(|user| user.id);
            if current != Some(user_id) {
                debug!(%user_id, "discarding roles for inactive user");
                record_role_result_discarded();
                return None;
            }
            state.snapshot.roles = roles;
            state.snapshot.roles_phase = AuthPhase::Ready;
            Some(())
        });
    }

    fn spawn_role_fetch(self: &Arc<Self>, user_id: UserId) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(self);
        let resolver = self.resolver.clone();

        let mut tasks = self.tasks.lock();
        while tasks.role_fetches.try_join_next().is_some() {}
        tasks.role_fetches.spawn(async move {
            let roles = resolver.fetch(&user_id).await;
            if let Some(inner) = weak.upgrade() {
                inner.apply_roles(user_id, roles);
            }
        });
    }

    fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        if let Some(events) = tasks.events.take() {
            events.abort();
        }
        tasks.role_fetches.abort_all();
        drop(tasks);

        self.listeners.lock().clear();
        self.view_tx.lock().take();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Mirror a session into the snapshot. Returns the user whose roles must be
/// (re)fetched, if any.
fn apply_session(state: &mut State, session: Option<Session>) -> Option<UserId> {
    state.session_epoch += 1;
    let Some(session) = session else {
        state.snapshot = AuthSnapshot::signed_out();
        return None;
    };

    let user_id = session.user_id();
    let unchanged = state.snapshot.user.as_ref().map(|user| user.id) == Some(user_id);
    if unchanged {
        state.snapshot.user = Some(session.user.clone());
        state.snapshot.session = Some(session);
        return None;
    }

    state.snapshot = AuthSnapshot::authenticated(session);
    Some(user_id)
}

fn same_view(a: &AuthView, b: &AuthView) -> bool {
    a.user == b.user
        && a.session == b.session
        && a.roles == b.roles
        && a.auth_loading == b.auth_loading
        && a.roles_loading == b.roles_loading
        && a.is_authenticated == b.is_authenticated
}

async fn run_event_loop(inner: Weak<Inner>, mut rx: broadcast::Receiver<AuthChange>) {
    loop {
        let change = match rx.recv().await {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth events lagged, re-reading session");
                let Some(strong) = inner.upgrade() else { break };
                match strong.identity.get_session().await {
                    // a sign-out may have been among the skipped events
                    Ok(None) => AuthChange::new(AuthChangeEvent::SignedOut, None),
                    Ok(session) => AuthChange::new(AuthChangeEvent::InitialSession, session),
                    Err(err) => {
                        warn!(error = %err, "session re-read failed");
                        continue;
                    }
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("provider event stream closed");
                break;
            }
        };

        let Some(strong) = inner.upgrade() else { break };
        strong.handle_change(change);
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::Validation("a valid email address is required".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(AuthError::Validation("password is required".into()));
    }
    Ok(())
}
