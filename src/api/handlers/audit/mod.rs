//! Audit trail: the append-only sink and the admin-facing query endpoints.
//!
//! Every access decision and administrative action lands here. `record` never
//! propagates a storage failure to its caller; a broken audit write must not
//! break the operation it describes, so it is logged and dropped.

pub(crate) mod storage;

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::handlers::auth::{extract_client_ip, AuthState, Principal};

/// Action kinds recorded by the core. Domain modules add their own.
pub mod actions {
    pub const LOGIN: &str = "LOGIN";
    pub const LOGOUT: &str = "LOGOUT";
    pub const SESSION: &str = "SESSION";
    pub const ACCESS_401: &str = "ACCESS_401";
    pub const ACCESS_403: &str = "ACCESS_403";
    pub const USERS_LIST: &str = "USERS_LIST";
    pub const USER_UNLOCK: &str = "USER_UNLOCK";
    pub const USER_LOCK: &str = "USER_LOCK";
    pub const USER_RESET_PASSWORD: &str = "USER_RESET_PASSWORD";
    pub const AUDIT_LOGS: &str = "AUDIT_LOGS";
    pub const AUDIT_STATS: &str = "AUDIT_STATS";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// Append one audit event. Failures are logged, never raised: the triggering
/// business operation must not be aborted by its own paper trail.
pub async fn record(
    pool: &PgPool,
    actor: Option<Uuid>,
    action: &str,
    resource: &str,
    outcome: Outcome,
    ip: Option<&str>,
    description: Option<&str>,
) {
    if let Err(err) =
        storage::insert_event(pool, actor, action, resource, outcome.as_str(), ip, description)
            .await
    {
        error!("Failed to write audit event {action}/{resource}: {err:#}");
    }
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct AuditLogsParams {
    /// Filter by acting account id.
    pub user_id: Option<Uuid>,
    /// Filter by action kind, e.g. `LOGIN`.
    pub action: Option<String>,
    /// Filter by outcome: `SUCCESS` or `FAILED`.
    pub status: Option<String>,
    /// Inclusive calendar day, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    /// Inclusive calendar day, `YYYY-MM-DD`.
    pub date_to: Option<String>,
    /// Page size, capped at 500.
    pub limit: Option<i64>,
    /// Cursor: only records with an id below this are returned.
    pub before: Option<i64>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub resource: String,
    pub status: String,
    pub ip_address: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogsResponse {
    /// Records matching the filters, ignoring pagination.
    pub total: i64,
    /// Pass as `before` to fetch the next (older) page; absent on the last page.
    pub next_cursor: Option<i64>,
    pub logs: Vec<AuditLogEntry>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AuditStatsResponse {
    pub total_logins_today: i64,
    pub failed_attempts_today: i64,
    pub not_authenticated_today: i64,
    pub unauthorized_attempts_today: i64,
    pub active_sessions: usize,
}

const MAX_LOGS_LIMIT: i64 = 500;
const DEFAULT_LOGS_LIMIT: i64 = 200;

fn parse_day(value: &str) -> Result<NaiveDate, ApiError> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| ApiError::Validation("date_from/date_to must be YYYY-MM-DD".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/audit/logs",
    params(AuditLogsParams),
    responses(
        (status = 200, description = "Filtered audit records, newest first", body = AuditLogsResponse),
        (status = 400, description = "Malformed filter"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = [])),
    tag = "audit"
)]
pub async fn get_logs(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<AuditLogsParams>,
    Extension(pool): Extension<PgPool>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<AuditLogsResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);

    // Malformed filters are rejected, but only after the attempt itself has
    // been written to the trail.
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("SUCCESS") => Some("SUCCESS"),
        Some("FAILED") => Some("FAILED"),
        Some(_) => {
            record(
                &pool,
                Some(principal.account_id),
                actions::AUDIT_LOGS,
                "audit/logs",
                Outcome::Failed,
                Some(ip.as_str()),
                Some("invalid status filter"),
            )
            .await;
            return Err(ApiError::Validation(
                "status must be SUCCESS or FAILED".to_string(),
            ));
        }
    };

    let (date_from, date_to) = match (
        params.date_from.as_deref().map(parse_day).transpose(),
        params.date_to.as_deref().map(parse_day).transpose(),
    ) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(err), _) | (_, Err(err)) => {
            record(
                &pool,
                Some(principal.account_id),
                actions::AUDIT_LOGS,
                "audit/logs",
                Outcome::Failed,
                Some(ip.as_str()),
                Some("invalid date filter"),
            )
            .await;
            return Err(err);
        }
    };

    let filter = storage::AuditFilter {
        account_id: params.user_id,
        action: params
            .action
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty()),
        status,
        date_from,
        date_to,
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_LOGS_LIMIT)
        .clamp(1, MAX_LOGS_LIMIT);

    let (total, rows) = storage::query_events(&pool, &filter, limit, params.before).await?;

    // A full page means there may be older records behind the last id.
    let next_cursor = if rows.len() as i64 == limit {
        rows.last().map(|row| row.id)
    } else {
        None
    };

    let logs = rows
        .into_iter()
        .map(|row| AuditLogEntry {
            id: row.id,
            timestamp: row.ts,
            user_id: row.account_id,
            username: row.username,
            action: row.action,
            resource: row.resource,
            status: row.status,
            ip_address: row.ip_address,
            description: row.description,
        })
        .collect();

    record(
        &pool,
        Some(principal.account_id),
        actions::AUDIT_LOGS,
        "audit/logs",
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(AuditLogsResponse {
        total,
        next_cursor,
        logs,
    }))
}

#[utoipa::path(
    get,
    path = "/api/audit/stats",
    responses(
        (status = 200, description = "Daily counters for the dashboard", body = AuditStatsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = [])),
    tag = "audit"
)]
pub async fn get_stats(
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(pool): Extension<PgPool>,
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<AuditStatsResponse>, ApiError> {
    let ip = extract_client_ip(&headers, peer);

    let counters = storage::daily_counters(&pool).await?;
    let active_sessions = auth_state.sessions().active_count().await;

    record(
        &pool,
        Some(principal.account_id),
        actions::AUDIT_STATS,
        "audit/stats",
        Outcome::Success,
        Some(ip.as_str()),
        None,
    )
    .await;

    Ok(Json(AuditStatsResponse {
        total_logins_today: counters.logins,
        failed_attempts_today: counters.failed_logins,
        not_authenticated_today: counters.unauthenticated,
        unauthorized_attempts_today: counters.forbidden,
        active_sessions,
    }))
}
