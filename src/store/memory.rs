//! In-process store used by tests and local development.
//!
//! State lives behind a single `tokio::sync::Mutex`; every mutation happens
//! while the lock is held, which gives the same atomicity the Postgres
//! store gets from single-statement updates. The lock is never held across
//! an await into caller code.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Account, ActivityEntry, ClientInfo, LockoutState, Session};

use super::AuthStore;

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    sessions: HashMap<Uuid, Session>,
    activity: Vec<ActivityEntry>,
}

#[derive(Default)]
pub struct MemoryAuthStore {
    state: Mutex<State>,
}

impl MemoryAuthStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account, replacing any existing record with the same id.
    pub async fn insert_account(&self, account: Account) {
        let mut state = self.state.lock().await;
        state.accounts.insert(account.id, account);
    }

    /// Current account snapshot, if present.
    pub async fn account(&self, account_id: Uuid) -> Option<Account> {
        let state = self.state.lock().await;
        state.accounts.get(&account_id).cloned()
    }

    /// Current session snapshot, if present.
    pub async fn session(&self, session_id: Uuid) -> Option<Session> {
        let state = self.state.lock().await;
        state.sessions.get(&session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        let state = self.state.lock().await;
        state.sessions.len()
    }

    /// Snapshot of the append-only activity log.
    pub async fn activity_log(&self) -> Vec<ActivityEntry> {
        let state = self.state.lock().await;
        state.activity.clone()
    }

    /// Flip an account's active flag (admin-management stand-in for tests).
    pub async fn set_account_active(&self, account_id: Uuid, is_active: bool) {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.is_active = is_active;
        }
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn find_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.username == identifier || account.email == identifier)
            .cloned())
    }

    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn record_login_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_duration_seconds: i64,
    ) -> Result<LockoutState> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow::anyhow!("no such account: {account_id}"))?;
        account.failed_attempts += 1;
        if account.failed_attempts >= threshold {
            account.locked_until = Some(Utc::now() + Duration::seconds(lock_duration_seconds));
        }
        Ok(LockoutState {
            failed_attempts: account.failed_attempts,
            locked_until: account.locked_until,
        })
    }

    async fn reset_lockout(&self, account_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.failed_attempts = 0;
            account.locked_until = None;
        }
        Ok(())
    }

    async fn create_session(
        &self,
        account_id: Uuid,
        client: &ClientInfo,
        ttl_seconds: i64,
    ) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            account_id,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            is_active: true,
            last_activity_at: now,
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        };
        let mut state = self.state.lock().await;
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(&session_id).cloned())
    }

    async fn invalidate_session(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.is_active = false;
        }
        Ok(())
    }

    async fn extend_session(&self, session_id: Uuid, ttl_seconds: i64) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.expires_at = now + Duration::seconds(ttl_seconds);
            session.last_activity_at = now;
        }
        Ok(())
    }

    async fn touch_session(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.last_activity_at = Utc::now();
        }
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        state.activity.push(entry.clone());
        Ok(())
    }
}
