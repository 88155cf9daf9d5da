//! # Gardisto (Clinical Records Auth Core)
//!
//! `gardisto` authenticates human operators of a clinical records application,
//! binds each request to a role-scoped identity, and keeps a tamper-evident
//! audit trail of every access decision.
//!
//! ## Login hardening
//!
//! The login endpoint is protected by two independent layers:
//!
//! - **Per-IP rate limiting:** a sliding window (5 attempts per 60 seconds by
//!   default) rejects further attempts with `429` before credentials are even
//!   looked at.
//! - **Per-account lockout:** repeated failed verifications temporarily lock
//!   the account (5 failures, 30 minutes by default); administrators can also
//!   impose a permanent lock. A locked account never learns whether the
//!   submitted password was correct.
//!
//! ## Sessions
//!
//! Sessions are opaque bearer tokens (256 bits of OS randomness) owned by an
//! in-process store. Expiry is lazy and slides forward on use, so an idle
//! operator is logged out after inactivity rather than mid-shift.
//!
//! ## Audit
//!
//! The access guard records only denials (`ACCESS_401`, `ACCESS_403`);
//! handlers record their own business events. Audit writes never abort the
//! operation they describe.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}
