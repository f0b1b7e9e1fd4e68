//! Common test utilities for warden-auth-sync integration tests

pub mod mock_providers;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use warden_auth_sync::{AuthStateMachine, Subscription, SyncConfig};
use warden_types::AuthView;

#[allow(unused_imports)]
pub use mock_providers::{session_for, test_user, MockIdentityProvider, MockProfileStore};

/// Install a test subscriber once; honours `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a machine over the given mocks
#[allow(dead_code)]
pub fn machine(
    identity: &Arc<MockIdentityProvider>,
    profiles: &Arc<MockProfileStore>,
    config: SyncConfig,
) -> AuthStateMachine {
    init_tracing();
    AuthStateMachine::builder(identity.clone(), profiles.clone())
        .config(config)
        .build()
        .expect("valid config")
}

/// Every view published to a subscriber, in order
#[allow(dead_code)]
pub fn record_views(machine: &AuthStateMachine) -> (Subscription, Arc<Mutex<Vec<AuthView>>>) {
    let views = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&views);
    let sub = machine.subscribe(move |view| sink.lock().push(view.clone()));
    (sub, views)
}

/// Yield to other tasks until `cond` holds.
#[allow(dead_code)]
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Poll `cond` on the wall clock until it holds, for multi-threaded tests.
#[allow(dead_code)]
pub async fn poll_until(limit: Duration, mut cond: impl FnMut() -> bool) {
    let polling = async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(limit, polling)
        .await
        .expect("condition not reached in time");
}

/// Give spawned tasks a chance to run.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
