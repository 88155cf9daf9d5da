//! Login, session introspection and logout endpoints.

use axum::{
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};

use crate::api::error::ApiError;
use crate::api::handlers::audit::{actions, record, Outcome};

use super::lockout::lock_status;
use super::password::verify_password;
use super::state::AuthState;
use super::storage::{
    lookup_account, lookup_account_by_username, record_login_failure, record_login_success,
};
use super::types::{LoginRequest, LoginResponse, LogoutResponse, SessionResponse};
use super::utils::{extract_bearer_token, extract_client_ip};

const AUTH_RESOURCE: &str = "auth";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account locked"),
        (status = 429, description = "Too many attempts from this address")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);

    let Some(Json(request)) = payload else {
        record(
            &pool,
            None,
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("missing payload"),
        )
        .await;
        return Err(ApiError::Validation(
            "username and password required".to_string(),
        ));
    };

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        record(
            &pool,
            None,
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("missing fields"),
        )
        .await;
        return Err(ApiError::Validation(
            "username and password required".to_string(),
        ));
    }

    // The per-address window is checked before credentials are even looked
    // at, so probing nonexistent usernames burns the same budget. Direct
    // clients key by their socket peer address.
    if auth_state.rate_limiter().is_limited(&ip) {
        record(
            &pool,
            None,
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("rate limited"),
        )
        .await;
        return Err(ApiError::RateLimited {
            retry_after_seconds: auth_state.rate_limiter().retry_after().as_secs(),
        });
    }

    let account = lookup_account_by_username(&pool, username).await?;
    // Unknown username and wrong password produce identical responses.
    let Some(account) = account else {
        record(
            &pool,
            None,
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            None,
        )
        .await;
        return Err(ApiError::InvalidCredentials);
    };

    // Lock checks come before verification: a locked account must never
    // learn whether the submitted password was correct.
    if lock_status(&account, Utc::now()).is_locked() {
        record(
            &pool,
            Some(account.id),
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("account locked"),
        )
        .await;
        return Err(ApiError::AccountLocked);
    }

    if !verify_password(&account.password_hash, &request.password) {
        record_login_failure(
            &pool,
            account.id,
            auth_state.config().max_failed_logins(),
            auth_state.config().lockout_seconds(),
        )
        .await?;
        record(
            &pool,
            Some(account.id),
            actions::LOGIN,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            None,
        )
        .await;
        return Err(ApiError::InvalidCredentials);
    }

    record_login_success(&pool, account.id).await?;

    let token = auth_state.sessions().issue(account.id).await?;

    record(
        &pool,
        Some(account.id),
        actions::LOGIN,
        AUTH_RESOURCE,
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(LoginResponse {
        user_id: account.id,
        username: account.username,
        role: account.role,
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Caller's resolved identity", body = SessionResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
) -> Result<Json<SessionResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);

    let account_id = match extract_bearer_token(&headers) {
        Some(token) => auth_state.sessions().validate(&token).await,
        None => None,
    };
    let account = match account_id {
        Some(id) => lookup_account(&pool, id).await?,
        None => None,
    };

    let Some(account) = account else {
        record(
            &pool,
            None,
            actions::SESSION,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            None,
        )
        .await;
        return Err(ApiError::Unauthenticated);
    };

    record(
        &pool,
        Some(account.id),
        actions::SESSION,
        AUTH_RESOURCE,
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(SessionResponse {
        user_id: account.id,
        username: account.username,
        role: account.role,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked (idempotent)", body = LogoutResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
) -> Json<LogoutResponse> {
    let ip = extract_client_ip(&headers, peer);

    // Resolve the actor before revoking so the event can be attributed.
    // An unknown or expired token still yields a successful logout.
    if let Some(token) = extract_bearer_token(&headers) {
        let account_id = auth_state.sessions().validate(&token).await;
        auth_state.sessions().revoke(&token).await;

        match account_id {
            Some(id) => {
                record(
                    &pool,
                    Some(id),
                    actions::LOGOUT,
                    AUTH_RESOURCE,
                    Outcome::Success,
                    Some(ip.as_str()),
                    None,
                )
                .await;
            }
            None => {
                record(
                    &pool,
                    None,
                    actions::LOGOUT,
                    AUTH_RESOURCE,
                    Outcome::Failed,
                    Some(ip.as_str()),
                    Some("no active session"),
                )
                .await;
            }
        }
    } else {
        record(
            &pool,
            None,
            actions::LOGOUT,
            AUTH_RESOURCE,
            Outcome::Failed,
            Some(ip.as_str()),
            Some("no bearer token"),
        )
        .await;
    }

    Json(LogoutResponse { ok: true })
}
