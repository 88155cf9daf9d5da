//! Administrative account operations (admin role only): listing, unlock,
//! permanent lock, and password reset.

use axum::{
    extract::{ConnectInfo, Extension, Path},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::audit::{actions, record, Outcome};
use crate::api::handlers::auth::{
    extract_client_ip, hash_password, validate_password, Principal, Role,
};
use crate::api::handlers::auth::lockout::{lock_status, LockStatus};
use crate::api::handlers::auth::storage::{
    list_accounts, lock_account, lookup_account, unlock_account, update_password,
};
use crate::api::handlers::auth::types::Account;

#[derive(Serialize, ToSchema, Debug)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub failed_attempts: i32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub permanently_locked: bool,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct UserActionResponse {
    pub ok: bool,
    pub user: UserSummary,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

fn summarize(account: &Account, now: DateTime<Utc>) -> UserSummary {
    let status = lock_status(account, now);
    UserSummary {
        id: account.id,
        username: account.username.clone(),
        role: account.role,
        full_name: account.full_name.clone(),
        failed_attempts: account.failed_login_attempts,
        is_locked: status.is_locked(),
        locked_until: match status {
            LockStatus::TemporarilyLocked { until } => Some(until),
            _ => None,
        },
        permanently_locked: account.permanently_locked,
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All operator accounts with lock state", body = [UserSummary]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let now = Utc::now();

    let accounts = list_accounts(&pool).await?;
    let users = accounts.iter().map(|a| summarize(a, now)).collect();

    record(
        &pool,
        Some(principal.account_id),
        actions::USERS_LIST,
        "users",
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/unlock",
    params(("id" = Uuid, Path, description = "Account to unlock")),
    responses(
        (status = 200, description = "Both lock kinds cleared, counter reset", body = UserActionResponse),
        (status = 404, description = "Unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn unlock(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(user_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserActionResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let resource = format!("user/{user_id}");

    if !unlock_account(&pool, user_id).await? {
        record(
            &pool,
            Some(principal.account_id),
            actions::USER_UNLOCK,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("user not found"),
        )
        .await;
        return Err(ApiError::NotFound("user"));
    }

    let account = lookup_account(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    record(
        &pool,
        Some(principal.account_id),
        actions::USER_UNLOCK,
        &resource,
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(UserActionResponse {
        ok: true,
        user: summarize(&account, Utc::now()),
    }))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/lock",
    params(("id" = Uuid, Path, description = "Account to permanently lock")),
    responses(
        (status = 200, description = "Account permanently locked", body = UserActionResponse),
        (status = 403, description = "Self-lock refused"),
        (status = 404, description = "Unknown account"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn lock(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(user_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserActionResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let resource = format!("user/{user_id}");

    // An admin locking their own account would leave the system without an
    // active administrator. Refused before any state changes.
    if user_id == principal.account_id {
        record(
            &pool,
            Some(principal.account_id),
            actions::USER_LOCK,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("self-lock refused"),
        )
        .await;
        return Err(ApiError::SelfLockDenied);
    }

    if !lock_account(&pool, user_id).await? {
        record(
            &pool,
            Some(principal.account_id),
            actions::USER_LOCK,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("user not found"),
        )
        .await;
        return Err(ApiError::NotFound("user"));
    }

    let account = lookup_account(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    record(
        &pool,
        Some(principal.account_id),
        actions::USER_LOCK,
        &resource,
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(UserActionResponse {
        ok: true,
        user: summarize(&account, Utc::now()),
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/reset-password",
    params(("id" = Uuid, Path, description = "Account whose password is reset")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset, lock state cleared", body = OkResponse),
        (status = 400, description = "Password rejected by policy"),
        (status = 404, description = "Unknown account"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn reset_password(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(user_id): Path<Uuid>,
    Extension(pool): Extension<PgPool>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<OkResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let resource = format!("user/{user_id}");

    let new_password = payload
        .map(|Json(body)| body.new_password)
        .unwrap_or_default();

    if let Err(reason) = validate_password(&new_password) {
        record(
            &pool,
            Some(principal.account_id),
            actions::USER_RESET_PASSWORD,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            Some(reason),
        )
        .await;
        return Err(ApiError::Validation(reason.to_string()));
    }

    let password_hash = hash_password(&new_password)?;

    if !update_password(&pool, user_id, &password_hash).await? {
        record(
            &pool,
            Some(principal.account_id),
            actions::USER_RESET_PASSWORD,
            &resource,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("user not found"),
        )
        .await;
        return Err(ApiError::NotFound("user"));
    }

    record(
        &pool,
        Some(principal.account_id),
        actions::USER_RESET_PASSWORD,
        &resource,
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(OkResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(locked_until: Option<DateTime<Utc>>, permanently_locked: bool) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: String::new(),
            role: Role::Technician,
            full_name: Some("Alice Example".to_string()),
            failed_login_attempts: 3,
            locked_until,
            permanently_locked,
        }
    }

    #[test]
    fn summary_reports_active_temporary_lock() {
        let now = Utc::now();
        let until = now + Duration::minutes(10);
        let summary = summarize(&account(Some(until), false), now);
        assert!(summary.is_locked);
        assert_eq!(summary.locked_until, Some(until));
        assert!(!summary.permanently_locked);
    }

    #[test]
    fn summary_drops_expired_lock() {
        let now = Utc::now();
        let summary = summarize(&account(Some(now - Duration::minutes(1)), false), now);
        assert!(!summary.is_locked);
        assert_eq!(summary.locked_until, None);
    }

    #[test]
    fn summary_flags_permanent_lock() {
        let now = Utc::now();
        let summary = summarize(&account(None, true), now);
        assert!(summary.is_locked);
        assert!(summary.permanently_locked);
        assert_eq!(summary.locked_until, None);
    }
}
