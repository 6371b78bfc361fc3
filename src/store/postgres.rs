//! Postgres-backed store.
//!
//! Every mutation that the orchestrator relies on for correctness is a
//! single SQL statement, so row-level locking in Postgres provides the
//! atomicity; the crate never does read-then-write lockout updates.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::models::{Account, ActivityEntry, ClientInfo, LockoutState, Role, Session};

use super::AuthStore;

pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_account(row: &PgRow) -> Result<Account> {
    let role: String = row.get("role");
    let role = Role::parse(&role).map_err(|value| anyhow!("unknown role in store: {value}"))?;
    Ok(Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        is_active: row.get("is_active"),
        failed_attempts: row.get("failed_attempts"),
        locked_until: row.get("locked_until"),
        mfa_enabled: row.get("mfa_enabled"),
    })
}

fn map_session(row: &PgRow) -> Session {
    Session {
        id: row.get("id"),
        account_id: row.get("admin_id"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        is_active: row.get("is_active"),
        last_activity_at: row.get("last_activity_at"),
        ip: row.get("ip"),
        user_agent: row.get("user_agent"),
    }
}

const ACCOUNT_COLUMNS: &str = r"
    id, username, email, password_hash, role::text AS role,
    is_active, failed_attempts, locked_until, mfa_enabled
";

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn find_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM admins WHERE username = $1 OR email = $1 LIMIT 1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by identifier")?;
        row.as_ref().map(map_account).transpose()
    }

    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM admins WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")?;
        row.as_ref().map(map_account).transpose()
    }

    async fn record_login_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_duration_seconds: i64,
    ) -> Result<LockoutState> {
        // One statement: the increment and the conditional lock happen under
        // the row lock, so concurrent failures cannot lose updates.
        let query = r"
            UPDATE admins
            SET failed_attempts = failed_attempts + 1,
                locked_until = CASE
                    WHEN failed_attempts + 1 >= $2
                        THEN NOW() + ($3 * INTERVAL '1 second')
                    ELSE locked_until
                END
            WHERE id = $1
            RETURNING failed_attempts, locked_until
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(threshold)
            .bind(lock_duration_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login failure")?;
        Ok(LockoutState {
            failed_attempts: row.get("failed_attempts"),
            locked_until: row.get("locked_until"),
        })
    }

    async fn reset_lockout(&self, account_id: Uuid) -> Result<()> {
        let query = "UPDATE admins SET failed_attempts = 0, locked_until = NULL WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to reset lockout state")?;
        Ok(())
    }

    async fn create_session(
        &self,
        account_id: Uuid,
        client: &ClientInfo,
        ttl_seconds: i64,
    ) -> Result<Session> {
        // Session ids are random v4 UUIDs; a collision would violate the
        // primary key and surface as an error rather than an overwrite.
        let query = r"
            INSERT INTO admin_sessions (id, admin_id, ip, user_agent, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
            RETURNING id, admin_id, created_at, expires_at, is_active, last_activity_at, ip, user_agent
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(&client.ip)
            .bind(&client.user_agent)
            .bind(ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to create session")?;
        Ok(map_session(&row))
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let query = r"
            SELECT id, admin_id, created_at, expires_at, is_active, last_activity_at, ip, user_agent
            FROM admin_sessions
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;
        Ok(row.as_ref().map(map_session))
    }

    async fn invalidate_session(&self, session_id: Uuid) -> Result<()> {
        // Idempotent; zero affected rows is fine.
        let query = "UPDATE admin_sessions SET is_active = FALSE WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to invalidate session")?;
        Ok(())
    }

    async fn extend_session(&self, session_id: Uuid, ttl_seconds: i64) -> Result<()> {
        let query = r"
            UPDATE admin_sessions
            SET expires_at = NOW() + ($2 * INTERVAL '1 second'),
                last_activity_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to extend session")?;
        Ok(())
    }

    async fn touch_session(&self, session_id: Uuid) -> Result<()> {
        // Records activity for audit without extending the session TTL.
        let query = "UPDATE admin_sessions SET last_activity_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to touch session")?;
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let detail = serde_json::json!({
            "duration_ms": entry.duration_ms(),
        });
        let query = r"
            INSERT INTO activity_logs
                (log_type, activity_type, message, admin_id, ip, started_at, finished_at, detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(match entry.level {
                crate::models::ActivityLevel::Info => "INFO",
                crate::models::ActivityLevel::Error => "ERROR",
            })
            .bind(entry.activity.as_str())
            .bind(&entry.message)
            .bind(entry.account_id)
            .bind(entry.ip.as_deref())
            .bind(entry.started_at)
            .bind(entry.finished_at)
            .bind(detail.to_string())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to append activity log entry")?;
        Ok(())
    }
}
