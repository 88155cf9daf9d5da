//! Auth configuration and shared state.

use std::sync::Arc;
use std::time::Duration;

use super::rate_limit::RateLimiter;
use super::session::SessionStore;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_MAX_FAILED_LOGINS: u32 = 5;
const DEFAULT_LOCKOUT_SECONDS: u64 = 30 * 60;
const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 5;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: u64,
    max_failed_logins: u32,
    lockout_seconds: u64,
    rate_limit_attempts: u32,
    rate_limit_window_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            rate_limit_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_failed_logins(mut self, attempts: u32) -> Self {
        self.max_failed_logins = attempts;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: u64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_attempts(mut self, attempts: u32) -> Self {
        self.rate_limit_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn max_failed_logins(&self) -> u32 {
        self.max_failed_logins
    }

    #[must_use]
    pub fn lockout_seconds(&self) -> u64 {
        self.lockout_seconds
    }

    #[must_use]
    pub fn rate_limit_attempts(&self) -> u32 {
        self.rate_limit_attempts
    }

    #[must_use]
    pub fn rate_limit_window_seconds(&self) -> u64 {
        self.rate_limit_window_seconds
    }
}

/// Shared auth state: configuration, the session store, and the login rate
/// limiter. Handlers receive it as an `Extension<Arc<AuthState>>`.
pub struct AuthState {
    config: AuthConfig,
    sessions: SessionStore,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_seconds()));
        Self {
            config,
            sessions,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
