//! Warden Types - Shared domain types
//!
//! This crate contains the domain types shared by the Warden synchronizer and
//! its consumers:
//! - Identity users and provider sessions
//! - Role sets
//! - Auth snapshots and consumer views
//! - Provider push events and host visibility signals

pub mod error;
pub mod event;
pub mod role;
pub mod session;
pub mod snapshot;
pub mod user;

pub use error::*;
pub use event::*;
pub use role::*;
pub use session::*;
pub use snapshot::*;
pub use user::*;
