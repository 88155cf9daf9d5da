//! Database helpers for account and lockout state.
//!
//! Counter updates are single atomic statements so concurrent login attempts
//! against one account cannot lose increments.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{Account, Role};

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<Account> {
    let role: String = row.get("role");
    Ok(Account {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: role.parse::<Role>()?,
        full_name: row.get("full_name"),
        failed_login_attempts: row.get("failed_login_attempts"),
        locked_until: row.get("locked_until"),
        permanently_locked: row.get("permanently_locked"),
    })
}

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, role, full_name, \
     failed_login_attempts, locked_until, permanently_locked";

pub(crate) async fn lookup_account_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Account>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by username")?;

    row.as_ref().map(account_from_row).transpose()
}

pub(crate) async fn lookup_account(pool: &PgPool, id: Uuid) -> Result<Option<Account>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account")?;

    row.as_ref().map(account_from_row).transpose()
}

pub(crate) async fn list_accounts(pool: &PgPool) -> Result<Vec<Account>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username ASC");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list accounts")?;

    rows.iter().map(account_from_row).collect()
}

/// Record a failed verification: increment the counter and, when it reaches
/// the ceiling, start the temporary lock. One statement, so the
/// read-modify-write cannot race another request on the same account.
pub(crate) async fn record_login_failure(
    pool: &PgPool,
    id: Uuid,
    max_failed_logins: u32,
    lockout_seconds: u64,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = failed_login_attempts + 1,
            locked_until = CASE
                WHEN failed_login_attempts + 1 >= $2
                THEN NOW() + ($3 * INTERVAL '1 second')
                ELSE locked_until
            END,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .bind(i64::from(max_failed_logins))
        .bind(i64::try_from(lockout_seconds).unwrap_or(i64::MAX))
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login failure")?;
    Ok(())
}

/// Reset the failure counter and clear the temporary lock. The permanent
/// flag is untouched: only an administrative unlock clears it.
pub(crate) async fn record_login_success(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record login success")?;
    Ok(())
}

/// Administrative unlock: clears both lock kinds and the counter.
/// Returns `false` when the account does not exist.
pub(crate) async fn unlock_account(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET failed_login_attempts = 0,
            locked_until = NULL,
            permanently_locked = FALSE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to unlock account")?;
    Ok(result.rows_affected() > 0)
}

/// Administrative permanent lock. The self-lock check happens in the handler,
/// before this runs. Returns `false` when the account does not exist.
pub(crate) async fn lock_account(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET permanently_locked = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to lock account")?;
    Ok(result.rows_affected() > 0)
}

/// Administrative password reset: new hash, lock state cleared.
/// Returns `false` when the account does not exist.
pub(crate) async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2,
            failed_login_attempts = 0,
            locked_until = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(result.rows_affected() > 0)
}
