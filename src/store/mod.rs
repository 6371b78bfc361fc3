//! Typed store interface the orchestrator depends on.
//!
//! One method per logical operation; implementations decide how each maps to
//! the backing store. The lockout update is specified as a single atomic
//! operation here so callers can never lose increments with a
//! read-then-write of their own.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Account, ActivityEntry, ClientInfo, LockoutState, Session};

mod memory;
mod postgres;

pub use memory::MemoryAuthStore;
pub use postgres::PgAuthStore;

/// Backing-store contract for accounts, sessions, and the activity log.
///
/// All methods re-read state on every call; implementations must not cache
/// across calls, so deactivation, role changes, and lockouts are visible to
/// the very next request.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Look up an account by username or email.
    async fn find_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>>;

    /// Look up an account by id (used by session verification re-fetch).
    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>>;

    /// Atomically increment the failure counter and, when the new count
    /// reaches `threshold`, set the lock expiry `lock_duration_seconds`
    /// from now. Returns the post-update state. Must execute as one atomic
    /// read-modify-write; two concurrent calls must yield two increments.
    async fn record_login_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_duration_seconds: i64,
    ) -> Result<LockoutState>;

    /// Atomically zero the failure counter and clear the lock expiry.
    async fn reset_lockout(&self, account_id: Uuid) -> Result<()>;

    /// Create an active session with a fresh unguessable id.
    async fn create_session(
        &self,
        account_id: Uuid,
        client: &ClientInfo,
        ttl_seconds: i64,
    ) -> Result<Session>;

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Mark a session inactive. Idempotent; unknown and already-inactive
    /// sessions are not errors.
    async fn invalidate_session(&self, session_id: Uuid) -> Result<()>;

    /// Push the session expiry to now + `ttl_seconds` and refresh the
    /// activity timestamp.
    async fn extend_session(&self, session_id: Uuid, ttl_seconds: i64) -> Result<()>;

    /// Touch `last_activity_at` without extending the expiry.
    async fn touch_session(&self, session_id: Uuid) -> Result<()>;

    /// Append one immutable audit record.
    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()>;
}
