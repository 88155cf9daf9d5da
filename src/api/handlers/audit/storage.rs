//! Database access for the audit trail.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Filters shared by the count and the page query. The cursor is separate:
/// `total` reflects the whole filtered set, not the remainder of a page walk.
#[derive(Debug, Default)]
pub(crate) struct AuditFilter<'a> {
    pub(crate) account_id: Option<Uuid>,
    pub(crate) action: Option<&'a str>,
    pub(crate) status: Option<&'a str>,
    pub(crate) date_from: Option<NaiveDate>,
    pub(crate) date_to: Option<NaiveDate>,
}

pub(crate) struct AuditRow {
    pub(crate) id: i64,
    pub(crate) ts: DateTime<Utc>,
    pub(crate) account_id: Option<Uuid>,
    pub(crate) username: Option<String>,
    pub(crate) action: String,
    pub(crate) resource: String,
    pub(crate) status: String,
    pub(crate) ip_address: Option<String>,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DailyCounters {
    pub(crate) logins: i64,
    pub(crate) failed_logins: i64,
    pub(crate) unauthenticated: i64,
    pub(crate) forbidden: i64,
}

pub(crate) async fn insert_event(
    pool: &PgPool,
    account_id: Option<Uuid>,
    action: &str,
    resource: &str,
    status: &str,
    ip_address: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let query = r"
        INSERT INTO audit_log (account_id, action, resource, status, ip_address, description)
        VALUES ($1, $2, $3, $4, $5, $6)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(action)
        .bind(resource)
        .bind(status)
        .bind(ip_address)
        .bind(description)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert audit event")?;
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter<'_>) {
    builder.push(" WHERE 1=1");
    if let Some(account_id) = filter.account_id {
        builder.push(" AND audit_log.account_id = ");
        builder.push_bind(account_id);
    }
    if let Some(action) = filter.action {
        builder.push(" AND audit_log.action = ");
        builder.push_bind(action.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND audit_log.status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND audit_log.ts >= ");
        builder.push_bind(from);
        builder.push("::date");
    }
    if let Some(to) = filter.date_to {
        // Inclusive day: everything strictly before the next midnight.
        builder.push(" AND audit_log.ts < ");
        builder.push_bind(to);
        builder.push("::date + INTERVAL '1 day'");
    }
}

/// Fetch one reverse-chronological page plus the total matching count.
pub(crate) async fn query_events(
    pool: &PgPool,
    filter: &AuditFilter<'_>,
    limit: i64,
    before: Option<i64>,
) -> Result<(i64, Vec<AuditRow>)> {
    let mut count_builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM audit_log");
    push_filters(&mut count_builder, filter);

    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = "audit_log count"
    );
    let total: i64 = count_builder
        .build()
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count audit events")?
        .get("total");

    let mut page_builder = QueryBuilder::<Postgres>::new(
        "SELECT audit_log.id, audit_log.ts, audit_log.account_id, accounts.username, \
         audit_log.action, audit_log.resource, audit_log.status, audit_log.ip_address, \
         audit_log.description \
         FROM audit_log LEFT JOIN accounts ON accounts.id = audit_log.account_id",
    );
    push_filters(&mut page_builder, filter);
    if let Some(before) = before {
        page_builder.push(" AND audit_log.id < ");
        page_builder.push_bind(before);
    }
    page_builder.push(" ORDER BY audit_log.id DESC LIMIT ");
    page_builder.push_bind(limit);

    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = "audit_log page"
    );
    let rows = page_builder
        .build()
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to query audit events")?;

    let page = rows
        .into_iter()
        .map(|row| AuditRow {
            id: row.get("id"),
            ts: row.get("ts"),
            account_id: row.get("account_id"),
            username: row.get("username"),
            action: row.get("action"),
            resource: row.get("resource"),
            status: row.get("status"),
            ip_address: row.get("ip_address"),
            description: row.get("description"),
        })
        .collect();

    Ok((total, page))
}

/// Precomputed counters for the dashboard, scoped to the current UTC day.
pub(crate) async fn daily_counters(pool: &PgPool) -> Result<DailyCounters> {
    let query = r"
        SELECT
            COUNT(*) FILTER (WHERE action = 'LOGIN' AND status = 'SUCCESS') AS logins,
            COUNT(*) FILTER (WHERE action = 'LOGIN' AND status = 'FAILED') AS failed_logins,
            COUNT(*) FILTER (WHERE action = 'ACCESS_401' AND status = 'FAILED') AS unauthenticated,
            COUNT(*) FILTER (WHERE action = 'ACCESS_403' AND status = 'FAILED') AS forbidden
        FROM audit_log
        WHERE ts >= date_trunc('day', NOW())
          AND ts < date_trunc('day', NOW()) + INTERVAL '1 day'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to compute audit counters")?;

    Ok(DailyCounters {
        logins: row.get("logins"),
        failed_logins: row.get("failed_logins"),
        unauthenticated: row.get("unauthenticated"),
        forbidden: row.get("forbidden"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_sql(filter: &AuditFilter<'_>) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log");
        push_filters(&mut builder, filter);
        builder.sql().to_string()
    }

    #[test]
    fn no_filters_is_bare_where() {
        let sql = rendered_sql(&AuditFilter::default());
        assert!(sql.ends_with(" WHERE 1=1"));
    }

    #[test]
    fn filters_bind_rather_than_interpolate() {
        let filter = AuditFilter {
            account_id: Some(Uuid::new_v4()),
            action: Some("LOGIN"),
            status: Some("FAILED"),
            date_from: NaiveDate::from_ymd_opt(2025, 6, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 6, 30),
        };
        let sql = rendered_sql(&filter);
        // Values go through placeholders; none of them appear in the SQL text.
        assert!(!sql.contains("LOGIN"));
        assert!(!sql.contains("FAILED"));
        assert!(sql.contains("audit_log.account_id = $1"));
        assert!(sql.contains("audit_log.action = $2"));
        assert!(sql.contains("audit_log.status = $3"));
        assert!(sql.contains("audit_log.ts >= $4"));
        assert!(sql.contains("audit_log.ts < $5"));
    }

    #[test]
    fn date_to_is_inclusive_day() {
        let filter = AuditFilter {
            date_to: NaiveDate::from_ymd_opt(2025, 6, 30),
            ..AuditFilter::default()
        };
        let sql = rendered_sql(&filter);
        assert!(sql.contains("INTERVAL '1 day'"));
    }
}
