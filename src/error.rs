//! Closed error taxonomy returned by the orchestrator.
//!
//! Every internal failure is classified into exactly one variant before it
//! crosses the crate boundary; raw store errors never leak. `InvalidCredentials`
//! deliberately merges "unknown identifier" and "wrong password" to prevent
//! username enumeration, while locked/inactive stay distinguishable (an
//! intentional asymmetry carried over from the original system).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown identifier or wrong password; never distinguished.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The lockout ledger reports an active lock. The expiry appears in the
    /// human-readable message only, never in the machine-readable code.
    #[error("Account is locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("Account is inactive")]
    AccountInactive,

    /// Session missing, inactive, or expired; merged into one code.
    #[error("Session is invalid")]
    SessionInvalid,

    #[error("Refresh is not possible for this session")]
    RefreshInvalid,

    /// Signature, structure, or expiry failure at the token issuer.
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// Unexpected failure from the backing store or elsewhere. Full detail
    /// is logged internally; callers only see a generic message.
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

/// Serializable failure body for the HTTP layer.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    /// Stable machine-readable code from the fixed taxonomy.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountLocked { .. } => "account_locked",
            Self::AccountInactive => "account_inactive",
            Self::SessionInvalid => "session_invalid",
            Self::RefreshInvalid => "refresh_invalid",
            Self::InvalidOrExpiredToken => "invalid_or_expired_token",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to surface to callers. `Internal` keeps its detail out
    /// of the public body; everything else uses the Display form.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: "error",
            code: self.code(),
            message: self.public_message(),
        }
    }
}
