//! Authentication core: credentials, lockout, rate limiting, sessions, and
//! the access guard.
//!
//! ## Login hardening
//!
//! Checks run in a fixed order: per-address rate limit, account lookup,
//! permanent lock, temporary lock, credential verification, failure-counter
//! increment. The order is load-bearing; see `login.rs`.
//!
//! ## Session model
//!
//! Opaque bearer tokens held in an in-process store with sliding expiry.
//! There is deliberately no shared session table: one server process owns
//! its sessions, and a restart logs everyone out.

pub(crate) mod guard;
pub(crate) mod lockout;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod rate_limit;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
pub(crate) mod types;
mod utils;

pub use guard::{access_guard, Principal, RequiredRoles, ADMIN_ONLY};
pub use password::{hash_password, validate_password, verify_password};
pub use rate_limit::{NoopRateLimiter, RateLimiter, SlidingWindowLimiter};
pub use session::SessionStore;
pub use state::{AuthConfig, AuthState};
pub use types::Role;

pub(crate) use utils::extract_client_ip;
