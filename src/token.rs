//! Stateless access/refresh token issuing and verification.
//!
//! Tokens are HS256 JWTs. Access and refresh tokens use distinct signing
//! secrets and lifetimes so a leaked access secret cannot mint refresh
//! tokens. A verified token's `sid` is a pointer into the session store,
//! not proof of a live session; callers must still cross-check it.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::Role;

/// Which of the two token families a token belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in both token kinds.
///
/// The embedded role is a cache for the HTTP layer's convenience; session
/// verification always re-fetches the account and never trusts it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub sid: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Freshly minted access/refresh pair.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies session-bound tokens.
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let access_secret = config.access_secret().expose_secret().as_bytes();
        let refresh_secret = config.refresh_secret().expose_secret().as_bytes();
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl: Duration::seconds(config.access_ttl_seconds()),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds()),
        }
    }

    /// Mint an access and a refresh token bound to the given session.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn issue_pair(
        &self,
        account_id: Uuid,
        username: &str,
        email: &str,
        role: Role,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenPair> {
        let access_token = self.issue(
            account_id,
            username,
            email,
            role,
            session_id,
            TokenKind::Access,
            now,
        )?;
        let refresh_token = self.issue(
            account_id,
            username,
            email,
            role,
            session_id,
            TokenKind::Refresh,
            now,
        )?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn issue(
        &self,
        account_id: Uuid,
        username: &str,
        email: &str,
        role: Role,
        session_id: Uuid,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: account_id,
            username: username.to_string(),
            email: email.to_string(),
            role,
            sid: session_id,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let key = match kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        };
        encode(&Header::default(), &claims, key).context("failed to encode token")
    }

    /// Verify a token of the expected kind and return its claims.
    ///
    /// Fails closed: signature mismatch, malformed structure, expiry, or a
    /// kind mismatch all collapse into `InvalidOrExpiredToken`. Unverified
    /// claims are never returned.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidOrExpiredToken` on any verification failure.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let key = match expected {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let validation = Validation::new(Algorithm::HS256);
        let data =
            decode::<Claims>(token, key, &validation).map_err(|_| AuthError::InvalidOrExpiredToken)?;
        if data.claims.kind != expected {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn issuer() -> TokenIssuer {
        let config = AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        );
        TokenIssuer::new(&config)
    }

    fn mint(issuer: &TokenIssuer, session_id: Uuid) -> TokenPair {
        issuer
            .issue_pair(
                Uuid::new_v4(),
                "alice",
                "alice@example.com",
                Role::Admin,
                session_id,
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn access_token_verifies_and_carries_session_id() {
        let issuer = issuer();
        let session_id = Uuid::new_v4();
        let pair = mint(&issuer, session_id);

        let claims = issuer.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access() {
        let issuer = issuer();
        let pair = mint(&issuer, Uuid::new_v4());

        // Distinct secrets: the signature check alone rejects the swap.
        assert!(matches!(
            issuer.verify(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            issuer.verify(&pair.access_token, TokenKind::Refresh),
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn garbage_and_tampered_tokens_fail_closed() {
        let issuer = issuer();
        let pair = mint(&issuer, Uuid::new_v4());

        assert!(issuer.verify("not-a-jwt", TokenKind::Access).is_err());

        let mut tampered = pair.access_token.clone();
        tampered.pop();
        assert!(issuer.verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
        .with_access_ttl_seconds(1);
        let issuer = TokenIssuer::new(&config);
        let past = Utc::now() - Duration::hours(1);
        let pair = issuer
            .issue_pair(
                Uuid::new_v4(),
                "alice",
                "alice@example.com",
                Role::Viewer,
                Uuid::new_v4(),
                past,
            )
            .unwrap();
        assert!(matches!(
            issuer.verify(&pair.access_token, TokenKind::Access),
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }
}
