//! Account lockout state evaluation.
//!
//! The state itself lives on the account row (`failed_login_attempts`,
//! `locked_until`, `permanently_locked`); mutations happen in `storage` via
//! single atomic statements. This module only computes the status at a point
//! in time. A temporary lock expires by the clock passing `until`; no explicit
//! transition runs.

use chrono::{DateTime, Utc};

use super::types::Account;

/// Lock status of an account at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    TemporarilyLocked { until: DateTime<Utc> },
    PermanentlyLocked,
}

impl LockStatus {
    #[must_use]
    pub fn is_locked(self) -> bool {
        !matches!(self, Self::Unlocked)
    }
}

/// Compute the lock status. The permanent lock dominates: a permanently
/// locked account stays locked even when no temporary lock is active, so the
/// login flow never reaches credential verification for it.
#[must_use]
pub fn lock_status(account: &Account, now: DateTime<Utc>) -> LockStatus {
    if account.permanently_locked {
        return LockStatus::PermanentlyLocked;
    }
    match account.locked_until {
        Some(until) if until > now => LockStatus::TemporarilyLocked { until },
        _ => LockStatus::Unlocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::types::Role;
    use chrono::Duration;
    use uuid::Uuid;

    fn account(
        locked_until: Option<DateTime<Utc>>,
        permanently_locked: bool,
        failed: i32,
    ) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: String::new(),
            role: Role::Technician,
            full_name: None,
            failed_login_attempts: failed,
            locked_until,
            permanently_locked,
        }
    }

    #[test]
    fn fresh_account_is_unlocked() {
        let now = Utc::now();
        assert_eq!(lock_status(&account(None, false, 0), now), LockStatus::Unlocked);
    }

    #[test]
    fn future_locked_until_is_temporary_lock() {
        let now = Utc::now();
        let until = now + Duration::minutes(30);
        assert_eq!(
            lock_status(&account(Some(until), false, 5), now),
            LockStatus::TemporarilyLocked { until }
        );
    }

    #[test]
    fn expired_temporary_lock_is_unlocked() {
        let now = Utc::now();
        let until = now - Duration::seconds(1);
        assert_eq!(
            lock_status(&account(Some(until), false, 5), now),
            LockStatus::Unlocked
        );
    }

    #[test]
    fn permanent_lock_dominates() {
        let now = Utc::now();
        assert_eq!(
            lock_status(&account(None, true, 0), now),
            LockStatus::PermanentlyLocked
        );
        // Even with an expired temporary lock, the permanent flag wins.
        let until = now - Duration::minutes(5);
        assert_eq!(
            lock_status(&account(Some(until), true, 0), now),
            LockStatus::PermanentlyLocked
        );
    }

    #[test]
    fn is_locked_projection() {
        assert!(!LockStatus::Unlocked.is_locked());
        assert!(LockStatus::PermanentlyLocked.is_locked());
        assert!(LockStatus::TemporarilyLocked { until: Utc::now() }.is_locked());
    }
}
