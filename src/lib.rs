//! Credential and session management core for the Tendly business platform.
//!
//! ARCHITECTURE
//! ============
//! [`manager::SessionManager`] is the entry point: the host backend hands it
//! a `PgPool` plus [`config::AuthConfig`] and drives login, token refresh,
//! password update/reset, and logout through it. Beneath the manager sit
//! pure building blocks (crypto primitives, fingerprint trust scoring,
//! token signing) and the two store modules. Transient store failures retry
//! under [`retry::RetryPolicy`]; validation failures return immediately.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod manager;
pub mod retry;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorCode};
pub use fingerprint::DeviceFingerprint;
pub use manager::{LoginOutcome, PasswordChange, PrincipalSummary, RefreshOutcome, SessionManager};
pub use retry::RetryPolicy;
