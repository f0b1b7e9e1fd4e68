//! Warden Auth Sync - Session and role synchronizer
//!
//! Mediates between an identity provider, a user-role store and UI consumers,
//! presenting one flicker-free view of who is logged in and what roles they
//! hold.
//!
//! # Usage
//!
//! ```ignore
//! use warden_auth_sync::{AuthStateMachine, SyncConfig};
//!
//! let machine = AuthStateMachine::builder(identity, profiles)
//!     .config(SyncConfig::from_env()?)
//!     .build()?;
//!
//! let _sub = machine.subscribe(|view| render(view));
//! machine.start().await?;
//!
//! // Host wiring
//! machine.notify_host_signal(HostSignal::WindowFocused);
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod metrics;
pub mod provider;
pub mod roles;
pub mod sticky;
pub mod subscription;
pub mod visibility;

pub use config::{ConfigError, SyncConfig, DEFAULT_QUIET_PERIOD, DEFAULT_SIGN_OUT_TIMEOUT};
pub use error::{AuthError, ProfileError, ProviderError, Result};
pub use machine::{AuthStateMachine, AuthStateMachineBuilder};
pub use provider::{IdentityProvider, ProfileStore};
pub use roles::RoleResolver;
pub use sticky::StickyCache;
pub use subscription::Subscription;
pub use visibility::VisibilityGate;
