//! In-process session store for opaque bearer tokens.
//!
//! Sessions are owned by this store and never shared across processes. Expiry
//! is lazy: an expired entry is purged the moment it is looked up, and a
//! purged token is indistinguishable from one that was never issued. A valid
//! lookup slides the expiry forward (renew-on-use), so an idle operator is
//! logged out after inactivity rather than a fixed interval from login.

use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::utils::generate_session_token;

struct SessionEntry {
    account_id: Uuid,
    expires_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token bound to the account. One account may hold any
    /// number of concurrent sessions.
    ///
    /// # Errors
    /// Returns an error only if the OS random source fails.
    pub async fn issue(&self, account_id: Uuid) -> Result<String> {
        self.issue_at(account_id, Instant::now()).await
    }

    pub(crate) async fn issue_at(&self, account_id: Uuid, now: Instant) -> Result<String> {
        let mut sessions = self.sessions.lock().await;
        loop {
            let token = generate_session_token()?;
            // A collision over 256 random bits will not happen in practice,
            // but a live token must never be silently rebound.
            if sessions.contains_key(&token) {
                continue;
            }
            sessions.insert(
                token.clone(),
                SessionEntry {
                    account_id,
                    expires_at: now + self.ttl,
                },
            );
            return Ok(token);
        }
    }

    /// Resolve a token to its account id, sliding the expiry forward.
    ///
    /// Returns `None` for unknown tokens and for expired ones, purging the
    /// latter on the way out.
    pub async fn validate(&self, token: &str) -> Option<Uuid> {
        self.validate_at(token, Instant::now()).await
    }

    pub(crate) async fn validate_at(&self, token: &str, now: Instant) -> Option<Uuid> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(token)?;
        if entry.expires_at <= now {
            sessions.remove(token);
            return None;
        }
        entry.expires_at = now + self.ttl;
        Some(entry.account_id)
    }

    /// Delete a session. Revoking an unknown or already-revoked token is a
    /// no-op; logout must be idempotent.
    pub async fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token);
    }

    /// Count unexpired sessions, purging expired entries first.
    pub async fn active_count(&self) -> usize {
        self.active_count_at(Instant::now()).await
    }

    pub(crate) async fn active_count_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30 * 60);

    #[tokio::test]
    async fn issue_then_validate_round_trip() {
        let store = SessionStore::new(TTL);
        let account_id = Uuid::new_v4();

        let token = store.issue(account_id).await.unwrap();
        assert_eq!(store.validate(&token).await, Some(account_id));
    }

    #[tokio::test]
    async fn unknown_token_is_absent() {
        let store = SessionStore::new(TTL);
        assert_eq!(store.validate("no-such-token").await, None);
    }

    #[tokio::test]
    async fn expired_token_is_purged() {
        let store = SessionStore::new(TTL);
        let now = Instant::now();
        let token = store.issue_at(Uuid::new_v4(), now).await.unwrap();

        let after_expiry = now + TTL;
        assert_eq!(store.validate_at(&token, after_expiry).await, None);
        // Purged: a later lookup inside a fresh window still finds nothing.
        assert_eq!(store.validate_at(&token, now).await, None);
    }

    #[tokio::test]
    async fn validate_slides_expiry() {
        let store = SessionStore::new(TTL);
        let now = Instant::now();
        let token = store.issue_at(Uuid::new_v4(), now).await.unwrap();

        // Touch the session just before it would expire.
        let almost = now + TTL - Duration::from_secs(1);
        assert!(store.validate_at(&token, almost).await.is_some());

        // The original deadline has passed but the slide keeps it alive.
        let past_original = now + TTL + Duration::from_secs(1);
        assert!(store.validate_at(&token, past_original).await.is_some());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = SessionStore::new(TTL);
        let token = store.issue(Uuid::new_v4()).await.unwrap();

        store.revoke(&token).await;
        assert_eq!(store.validate(&token).await, None);
        // Second revoke of the same token is a no-op, not an error.
        store.revoke(&token).await;
        store.revoke("never-issued").await;
    }

    #[tokio::test]
    async fn concurrent_sessions_per_account() {
        let store = SessionStore::new(TTL);
        let account_id = Uuid::new_v4();

        let first = store.issue(account_id).await.unwrap();
        let second = store.issue(account_id).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.validate(&first).await, Some(account_id));
        assert_eq!(store.validate(&second).await, Some(account_id));
    }

    #[tokio::test]
    async fn active_count_prunes_expired() {
        let store = SessionStore::new(TTL);
        let now = Instant::now();
        store.issue_at(Uuid::new_v4(), now).await.unwrap();
        store.issue_at(Uuid::new_v4(), now).await.unwrap();

        assert_eq!(store.active_count_at(now).await, 2);
        assert_eq!(store.active_count_at(now + TTL).await, 0);
    }
}
