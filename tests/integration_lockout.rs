//! Integration tests for the login lockout lifecycle and audit trail.
//!
//! Each test orchestrates a transient Postgres container, applies the
//! schema, seeds operator accounts, spawns the actual `gardisto` binary and
//! drives it over real HTTP.

mod support;

use anyhow::{bail, Context, Result};
use gardisto::api::handlers::auth::hash_password;
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::{Connection, PgConnection};
use std::{
    net::TcpListener,
    process::{Child, Command, Stdio},
    time::Duration,
};
use support::PostgresContainer;
use tokio::time::sleep;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/db/schema.sql"));

const MAX_FAILED_LOGINS: u32 = 3;
const USER_PASSWORD: &str = "Val1d-Passw0rd!";
const ADMIN_PASSWORD: &str = "Adm1n-Passw0rd!";

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

struct TestContext {
    _postgres: PostgresContainer,
    _server: ChildGuard,
    base: String,
    user_id: Uuid,
}

impl TestContext {
    async fn new() -> Result<Self> {
        let postgres = PostgresContainer::start().await?;
        postgres.wait_until_ready().await?;

        let mut conn = PgConnection::connect(&postgres.dsn())
            .await
            .context("Failed to connect to Postgres for schema setup")?;
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&mut conn)
            .await
            .context("Failed to apply schema")?;

        let user_id = seed_account(&mut conn, "ortiz", "psychiatrist", USER_PASSWORD).await?;
        seed_account(&mut conn, "admin", "admin", ADMIN_PASSWORD).await?;

        let port = pick_port()?;
        let server = spawn_server(port, &postgres.dsn())?;

        Ok(Self {
            _postgres: postgres,
            _server: server,
            base: format!("http://127.0.0.1:{port}"),
            user_id,
        })
    }
}

async fn seed_account(
    conn: &mut PgConnection,
    username: &str,
    role: &str,
    password: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let hash = hash_password(password)?;
    sqlx::query(
        "INSERT INTO accounts (id, username, password_hash, role, full_name) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(username)
    .bind(hash)
    .bind(role)
    .bind(username)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to seed account {username}"))?;
    Ok(id)
}

fn spawn_server(port: u16, dsn: &str) -> Result<ChildGuard> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gardisto"));
    // Clear conflicting env vars that might leak from the host
    command.env_remove("GARDISTO_PORT");
    command.env_remove("GARDISTO_DSN");
    command.env_remove("GARDISTO_MAX_FAILED_LOGINS");
    command.env_remove("GARDISTO_RATE_LIMIT_ATTEMPTS");
    command.env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");

    // A generous per-address budget so the lockout ceiling is reached
    // before the rate limiter trips.
    let child = command
        .args([
            "--port",
            &port.to_string(),
            "--dsn",
            dsn,
            "--max-failed-logins",
            &MAX_FAILED_LOGINS.to_string(),
            "--lockout-minutes",
            "5",
            "--rate-limit-attempts",
            "100",
        ])
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to spawn gardisto binary")?;

    Ok(ChildGuard(child))
}

fn pick_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind a local port")?;
    Ok(listener
        .local_addr()
        .context("Failed to read local port")?
        .port())
}

async fn wait_for_ready(client: &reqwest::Client, base: &str) -> Result<()> {
    for _ in 0..40 {
        match client.get(format!("{base}/health")).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => sleep(Duration::from_millis(250)).await,
        }
    }
    bail!("gardisto did not become ready at {base}");
}

async fn login(
    client: &reqwest::Client,
    base: &str,
    username: &str,
    password: &str,
) -> Result<reqwest::Response> {
    client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .context("Login request failed")
}

async fn admin_token(client: &reqwest::Client, base: &str) -> Result<String> {
    let resp = login(client, base, "admin", ADMIN_PASSWORD).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("Login response carried no token")
}

#[tokio::test]
async fn failed_logins_lock_the_account_and_unlock_restores_access() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let ctx = TestContext::new().await?;
    let client = reqwest::Client::new();
    wait_for_ready(&client, &ctx.base).await?;

    // Wrong password up to the ceiling: plain credential rejections.
    for _ in 0..MAX_FAILED_LOGINS {
        let resp = login(&client, &ctx.base, "ortiz", "wrong-password").await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // The counter reached the ceiling: even the correct password is refused.
    let resp = login(&client, &ctx.base, "ortiz", USER_PASSWORD).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // An administrative unlock clears the lock and the counter.
    let token = admin_token(&client, &ctx.base).await?;
    let resp = client
        .post(format!("{}/api/users/{}/unlock", ctx.base, ctx.user_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = login(&client, &ctx.base, "ortiz", USER_PASSWORD).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // A successful login reset the counter: failures below the ceiling do
    // not lock, and the next correct password is accepted.
    for _ in 0..MAX_FAILED_LOGINS - 1 {
        let resp = login(&client, &ctx.base, "ortiz", "wrong-password").await?;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = login(&client, &ctx.base, "ortiz", USER_PASSWORD).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn malformed_audit_filters_land_in_the_trail() -> Result<()> {
    if let Err(err) = support::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }

    let ctx = TestContext::new().await?;
    let client = reqwest::Client::new();
    wait_for_ready(&client, &ctx.base).await?;

    let token = admin_token(&client, &ctx.base).await?;

    // Both rejected filters must be written to the trail before the 400.
    let resp = client
        .get(format!("{}/api/audit/logs?status=BOGUS", ctx.base))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(format!("{}/api/audit/logs?date_from=yesterday", ctx.base))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(format!(
            "{}/api/audit/logs?action=AUDIT_LOGS&status=FAILED",
            ctx.base
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert!(
        body["total"].as_i64().unwrap_or(0) >= 2,
        "rejected filter attempts missing from the trail: {body}"
    );

    Ok(())
}
