//! Core data types for accounts, sessions, and the activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Administrative role carried by an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Approver,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Approver => "approver",
            Self::Admin => "admin",
        }
    }

    /// Parse a role from its stored text form.
    ///
    /// # Errors
    /// Returns the raw value back when it names no known role.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "approver" => Ok(Self::Approver),
            "admin" => Ok(Self::Admin),
            other => Err(other.to_string()),
        }
    }
}

/// Identity record as read from the backing store.
///
/// The password hash never leaves the crate; public payloads are built from
/// [`SessionPrincipal`] and [`LoginSession`] instead.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
}

impl Account {
    /// True iff the lockout expiry is strictly in the future.
    ///
    /// A past-due `locked_until` reads as unlocked but is only cleared by a
    /// successful login or an explicit reset, never by this check.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Post-update lockout state returned by the ledger.
#[derive(Clone, Copy, Debug)]
pub struct LockoutState {
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Server-side record of one authenticated login.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub last_activity_at: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
}

impl Session {
    /// A session is valid iff it is active and unexpired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Client metadata captured at login time.
#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// Severity of an activity-log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    Info,
    Error,
}

/// Machine-readable tag for an authentication event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    LoginSuccess,
    InvalidPassword,
    AccountLocked,
    AccountInactive,
    Logout,
    SessionRefresh,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "login-success",
            Self::InvalidPassword => "invalid-password",
            Self::AccountLocked => "account-locked",
            Self::AccountInactive => "account-inactive",
            Self::Logout => "logout",
            Self::SessionRefresh => "session-refresh",
        }
    }
}

/// One immutable audit record. Append-only; the core never mutates or
/// deletes entries.
#[derive(Clone, Debug)]
pub struct ActivityEntry {
    pub level: ActivityLevel,
    pub activity: ActivityKind,
    pub message: String,
    pub account_id: Option<Uuid>,
    pub ip: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ActivityEntry {
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Successful login payload handed to the HTTP layer.
#[derive(Clone, Debug, Serialize)]
pub struct LoginSession {
    #[serde(rename = "admin_id")]
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authenticated caller context, re-fetched from the store on every
/// verification so role changes and deactivation apply immediately.
#[derive(Clone, Debug, Serialize)]
pub struct SessionPrincipal {
    #[serde(rename = "admin_id")]
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub session_id: Uuid,
}

/// Rotated token pair returned by the refresh flow.
#[derive(Clone, Debug, Serialize)]
pub struct RefreshedSession {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Viewer, Role::Approver, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Ok(role));
        }
        assert_eq!(Role::parse("root"), Err("root".to_string()));
    }

    #[test]
    fn account_lock_check_is_strict() {
        let now = Utc::now();
        let mut account = account_fixture();
        assert!(!account.is_locked(now));

        account.locked_until = Some(now + Duration::minutes(5));
        assert!(account.is_locked(now));

        // A past-due lock reads as unlocked without being cleared.
        account.locked_until = Some(now - Duration::seconds(1));
        assert!(!account.is_locked(now));
        assert!(account.locked_until.is_some());
    }

    #[test]
    fn session_validity_needs_active_and_unexpired() {
        let now = Utc::now();
        let mut session = Session {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + Duration::hours(1),
            is_active: true,
            last_activity_at: now,
            ip: "127.0.0.1".to_string(),
            user_agent: "test".to_string(),
        };
        assert!(session.is_valid(now));

        session.is_active = false;
        assert!(!session.is_valid(now));

        session.is_active = true;
        session.expires_at = now - Duration::seconds(1);
        assert!(!session.is_valid(now));
    }

    #[test]
    fn activity_kind_tags_are_kebab_case() {
        assert_eq!(ActivityKind::LoginSuccess.as_str(), "login-success");
        assert_eq!(ActivityKind::InvalidPassword.as_str(), "invalid-password");
        let json = serde_json::to_string(&ActivityKind::AccountLocked).unwrap();
        assert_eq!(json, "\"account-locked\"");
    }

    #[test]
    fn activity_entry_duration() {
        let started = Utc::now();
        let entry = ActivityEntry {
            level: ActivityLevel::Info,
            activity: ActivityKind::LoginSuccess,
            message: "ok".to_string(),
            account_id: None,
            ip: None,
            started_at: started,
            finished_at: started + Duration::milliseconds(42),
        };
        assert_eq!(entry.duration_ms(), 42);
    }

    fn account_fixture() -> Account {
        Account {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$10$hash".to_string(),
            role: Role::Admin,
            is_active: true,
            failed_attempts: 0,
            locked_until: None,
            mfa_enabled: false,
        }
    }
}
