//! The authentication state machine.
//!
//! Sequences credential verification, the lockout ledger, the session store,
//! and the token issuer for login, logout, session verification, and token
//! refresh, and classifies every outcome into the closed [`AuthError`]
//! taxonomy. Each login attempt writes exactly one activity-log entry, except
//! the unknown-identifier case which has no account to attribute it to.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{
    ActivityEntry, ActivityKind, ActivityLevel, ClientInfo, LoginSession, RefreshedSession,
    SessionPrincipal,
};
use crate::password;
use crate::store::AuthStore;
use crate::token::{TokenIssuer, TokenKind};

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    issuer: TokenIssuer,
    config: AuthConfig,
    fallback_hash: String,
}

impl AuthService {
    /// Build the service around a store and configuration.
    ///
    /// # Errors
    /// Returns an error when the timing-equalization hash cannot be
    /// precomputed (out-of-range bcrypt cost).
    pub fn new(store: Arc<dyn AuthStore>, config: AuthConfig) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::new(&config);
        let fallback_hash = password::fallback_hash(config.bcrypt_cost())?;
        Ok(Self {
            store,
            issuer,
            config,
            fallback_hash,
        })
    }

    #[must_use]
    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Hash a password for provisioning or password changes, using the
    /// configured cost and a fresh salt.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` when hashing fails.
    pub async fn hash_password(&self, plain: &str) -> Result<String, AuthError> {
        let plain = plain.to_string();
        let cost = self.config.bcrypt_cost();
        run_blocking(move || password::hash_password(&plain, cost)).await
    }

    /// Attempt to authenticate `identifier` (username or email) with
    /// `password`, issuing a session and token pair on success.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown identifier or wrong password,
    /// `AccountLocked` while the lockout ledger reports an active lock,
    /// `AccountInactive` for deactivated accounts, `Internal` otherwise.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginSession, AuthError> {
        let started_at = Utc::now();

        let account = self.store.find_account_by_identifier(identifier).await?;
        let Some(account) = account else {
            // Burn one hash comparison so unknown identifiers cost roughly
            // the same as wrong passwords. No activity row: there is no
            // account id to attribute it to.
            self.equalize_timing(password).await;
            warn!(identifier, "login attempt for unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        if let Some(locked_until) = account.locked_until.filter(|until| *until > started_at) {
            // Lock precedence: no password check, no counter increment, no
            // lock extension, even when the password would be correct.
            self.record_activity(
                ActivityLevel::Error,
                ActivityKind::AccountLocked,
                format!("login rejected for {}: account locked", account.username),
                Some(account.id),
                client,
                started_at,
            )
            .await;
            return Err(AuthError::AccountLocked { locked_until });
        }

        if !account.is_active {
            self.record_activity(
                ActivityLevel::Error,
                ActivityKind::AccountInactive,
                format!("login rejected for {}: account inactive", account.username),
                Some(account.id),
                client,
                started_at,
            )
            .await;
            return Err(AuthError::AccountInactive);
        }

        if !self.verify_password(password, &account.password_hash).await? {
            let state = self
                .store
                .record_login_failure(
                    account.id,
                    self.config.lockout_threshold(),
                    self.config.lock_duration_seconds(),
                )
                .await?;
            self.record_activity(
                ActivityLevel::Error,
                ActivityKind::InvalidPassword,
                format!(
                    "invalid password for {} (attempt {})",
                    account.username, state.failed_attempts
                ),
                Some(account.id),
                client,
                started_at,
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        self.store.reset_lockout(account.id).await?;
        let session = self
            .store
            .create_session(account.id, client, self.config.session_ttl_seconds())
            .await?;
        let tokens = self.issuer.issue_pair(
            account.id,
            &account.username,
            &account.email,
            account.role,
            session.id,
            Utc::now(),
        )?;
        self.record_activity(
            ActivityLevel::Info,
            ActivityKind::LoginSuccess,
            format!("{} logged in", account.username),
            Some(account.id),
            client,
            started_at,
        )
        .await;

        Ok(LoginSession {
            account_id: account.id,
            username: account.username,
            email: account.email,
            role: account.role,
            session_id: session.id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: session.expires_at,
        })
    }

    /// Invalidate a session. Idempotent; the caller is assumed to already be
    /// authenticated, so no credential re-verification happens here.
    ///
    /// # Errors
    /// `Internal` when the store fails.
    pub async fn logout(&self, session_id: Uuid, account_id: Uuid) -> Result<(), AuthError> {
        let started_at = Utc::now();
        self.store.invalidate_session(session_id).await?;
        let entry = ActivityEntry {
            level: ActivityLevel::Info,
            activity: ActivityKind::Logout,
            message: format!("session {session_id} closed"),
            account_id: Some(account_id),
            ip: None,
            started_at,
            finished_at: Utc::now(),
        };
        self.append_activity_best_effort(&entry).await;
        Ok(())
    }

    /// Check a session is live and return the owner's current identity.
    ///
    /// Role, email, and active flag are re-fetched from the store: the
    /// token's embedded claims are a cache, never a source of truth, so
    /// role changes and deactivation apply to the very next request.
    ///
    /// # Errors
    /// `SessionInvalid` when the session is missing, inactive, or expired,
    /// or its owner is gone or deactivated; `Internal` on store failure.
    pub async fn verify_session(&self, session_id: Uuid) -> Result<SessionPrincipal, AuthError> {
        let now = Utc::now();
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|session| session.is_valid(now))
            .ok_or(AuthError::SessionInvalid)?;

        let account = self
            .store
            .find_account_by_id(session.account_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::SessionInvalid)?;

        if let Err(err) = self.store.touch_session(session.id).await {
            error!("failed to update session activity: {err:#}");
        }

        Ok(SessionPrincipal {
            account_id: account.id,
            username: account.username,
            email: account.email,
            role: account.role,
            session_id: session.id,
        })
    }

    /// Verify an access token and its underlying session in one step; the
    /// per-request operation the HTTP middleware performs.
    ///
    /// # Errors
    /// `InvalidOrExpiredToken` for bad tokens, then as [`Self::verify_session`].
    pub async fn authenticate(&self, access_token: &str) -> Result<SessionPrincipal, AuthError> {
        let claims = self.issuer.verify(access_token, TokenKind::Access)?;
        let principal = self.verify_session(claims.sid).await?;
        if principal.account_id != claims.sub {
            return Err(AuthError::SessionInvalid);
        }
        Ok(principal)
    }

    /// Rotate the token pair for a live session and extend its expiry.
    ///
    /// The old refresh token is not separately blacklisted; it dies with the
    /// session (logout or expiry), not before.
    ///
    /// # Errors
    /// `RefreshInvalid` when session re-validation fails; `Internal` on
    /// store failure.
    pub async fn refresh(
        &self,
        session_id: Uuid,
        account_id: Uuid,
    ) -> Result<RefreshedSession, AuthError> {
        let started_at = Utc::now();
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|session| session.is_valid(started_at) && session.account_id == account_id)
            .ok_or(AuthError::RefreshInvalid)?;

        let account = self
            .store
            .find_account_by_id(account_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::RefreshInvalid)?;

        let ttl = self.config.session_ttl_seconds();
        self.store.extend_session(session.id, ttl).await?;
        let tokens = self.issuer.issue_pair(
            account.id,
            &account.username,
            &account.email,
            account.role,
            session.id,
            Utc::now(),
        )?;

        let entry = ActivityEntry {
            level: ActivityLevel::Info,
            activity: ActivityKind::SessionRefresh,
            message: format!("session {session_id} refreshed"),
            account_id: Some(account.id),
            ip: None,
            started_at,
            finished_at: Utc::now(),
        };
        self.append_activity_best_effort(&entry).await;

        Ok(RefreshedSession {
            session_id: session.id,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(ttl),
        })
    }

    async fn verify_password(&self, plain: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let plain = plain.to_string();
        let stored_hash = stored_hash.to_string();
        run_blocking(move || password::verify_password(&plain, &stored_hash)).await
    }

    async fn equalize_timing(&self, plain: &str) {
        let plain = plain.to_string();
        let hash = self.fallback_hash.clone();
        let _ = run_blocking(move || password::verify_password(&plain, &hash)).await;
    }

    async fn record_activity(
        &self,
        level: ActivityLevel,
        activity: ActivityKind,
        message: String,
        account_id: Option<Uuid>,
        client: &ClientInfo,
        started_at: DateTime<Utc>,
    ) {
        let entry = ActivityEntry {
            level,
            activity,
            message,
            account_id,
            ip: Some(client.ip.clone()),
            started_at,
            finished_at: Utc::now(),
        };
        self.append_activity_best_effort(&entry).await;
    }

    /// A failed audit write must not change the authentication outcome, but
    /// it must reach operational logging.
    async fn append_activity_best_effort(&self, entry: &ActivityEntry) {
        if let Err(err) = self.store.append_activity(entry).await {
            error!(
                activity = entry.activity.as_str(),
                "failed to append activity log entry: {err:#}"
            );
        }
    }
}

// bcrypt is CPU-bound; run it on the blocking pool so request tasks keep
// making progress and no lock is held while computing.
async fn run_blocking<T, F>(work: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AuthError::Internal(anyhow!("blocking task failed: {err}")))?
        .map_err(AuthError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Role};
    use crate::store::MemoryAuthStore;
    use secrecy::SecretString;

    const TEST_COST: u32 = 4;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
        .with_bcrypt_cost(TEST_COST)
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: "192.0.2.10".to_string(),
            user_agent: "custodia-tests/1.0".to_string(),
        }
    }

    async fn service_with_account(password: &str) -> (AuthService, Arc<MemoryAuthStore>, Uuid) {
        let store = Arc::new(MemoryAuthStore::new());
        let account_id = Uuid::new_v4();
        let account = Account {
            id: account_id,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: password::hash_password(password, TEST_COST).unwrap(),
            role: Role::Admin,
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            mfa_enabled: false,
        };
        store.insert_account(account).await;
        let service = AuthService::new(store.clone() as Arc<dyn AuthStore>, config()).unwrap();
        (service, store, account_id)
    }

    #[tokio::test]
    async fn unknown_identifier_matches_wrong_password_shape() {
        let (service, store, _) = service_with_account("hunter2").await;

        let unknown = service.login("mallory", "hunter2", &client()).await;
        let wrong = service.login("alice", "wrong", &client()).await;

        let unknown = unknown.unwrap_err();
        let wrong = wrong.unwrap_err();
        assert_eq!(unknown.code(), "invalid_credentials");
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.public_message(), wrong.public_message());

        // Unknown identifier leaves no attributable audit row.
        let log = store.activity_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].activity, ActivityKind::InvalidPassword);
    }

    #[tokio::test]
    async fn wrong_password_increments_counter() {
        let (service, store, account_id) = service_with_account("hunter2").await;

        let err = service.login("alice", "wrong", &client()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let account = store.account(account_id).await.unwrap();
        assert_eq!(account.failed_attempts, 1);
        assert!(account.locked_until.is_none());
    }

    #[tokio::test]
    async fn success_resets_counter_and_mints_session() {
        let (service, store, account_id) = service_with_account("hunter2").await;
        let _ = service.login("alice", "wrong", &client()).await;

        let login = service.login("alice", "hunter2", &client()).await.unwrap();
        assert_eq!(login.account_id, account_id);
        assert_eq!(login.role, Role::Admin);

        let account = store.account(account_id).await.unwrap();
        assert_eq!(account.failed_attempts, 0);
        assert!(account.locked_until.is_none());

        let session = store.session(login.session_id).await.unwrap();
        assert!(session.is_active);
        assert_eq!(session.ip, "192.0.2.10");
        assert_eq!(session.user_agent, "custodia-tests/1.0");
    }

    #[tokio::test]
    async fn authenticate_rejects_token_for_dead_session() {
        let (service, _store, _) = service_with_account("hunter2").await;
        let login = service.login("alice", "hunter2", &client()).await.unwrap();

        let principal = service.authenticate(&login.access_token).await.unwrap();
        assert_eq!(principal.session_id, login.session_id);

        service
            .logout(login.session_id, login.account_id)
            .await
            .unwrap();
        // Token still verifies cryptographically, but the session check
        // must reject it.
        let err = service.authenticate(&login.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens_for_same_session() {
        let (service, _store, account_id) = service_with_account("hunter2").await;
        let login = service.login("alice", "hunter2", &client()).await.unwrap();

        let refreshed = service.refresh(login.session_id, account_id).await.unwrap();
        assert_eq!(refreshed.session_id, login.session_id);

        let claims = service
            .token_issuer()
            .verify(&refreshed.access_token, TokenKind::Access)
            .unwrap();
        assert_eq!(claims.sid, login.session_id);
    }

    #[tokio::test]
    async fn refresh_fails_for_foreign_account() {
        let (service, _store, _) = service_with_account("hunter2").await;
        let login = service.login("alice", "hunter2", &client()).await.unwrap();

        let err = service
            .refresh(login.session_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshInvalid));
    }
}
