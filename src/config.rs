//! Auth configuration with builder-style overrides.

use secrecy::SecretString;

const DEFAULT_LOCKOUT_THRESHOLD: i32 = 5;
const DEFAULT_LOCK_DURATION_SECONDS: i64 = 30 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_ACCESS_TTL_SECONDS: i64 = 2 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_BCRYPT_COST: u32 = 10;

/// Tunables for the authentication core.
///
/// Access and refresh tokens use distinct secrets by construction; there is
/// no single-secret constructor.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    lockout_threshold: i32,
    lock_duration_seconds: i64,
    session_ttl_seconds: i64,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    bcrypt_cost: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lock_duration_seconds: DEFAULT_LOCK_DURATION_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, attempts: i32) -> Self {
        self.lockout_threshold = attempts;
        self
    }

    #[must_use]
    pub fn with_lock_duration_seconds(mut self, seconds: i64) -> Self {
        self.lock_duration_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn lockout_threshold(&self) -> i32 {
        self.lockout_threshold
    }

    #[must_use]
    pub fn lock_duration_seconds(&self) -> i64 {
        self.lock_duration_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub(crate) fn access_secret(&self) -> &SecretString {
        &self.access_secret
    }

    pub(crate) fn refresh_secret(&self) -> &SecretString {
        &self.refresh_secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = config();
        assert_eq!(config.lockout_threshold(), 5);
        assert_eq!(config.lock_duration_seconds(), 30 * 60);
        assert_eq!(config.session_ttl_seconds(), 24 * 60 * 60);
        assert_eq!(config.access_ttl_seconds(), 2 * 60 * 60);
        assert_eq!(config.refresh_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.bcrypt_cost(), 10);
    }

    #[test]
    fn overrides_apply() {
        let config = config()
            .with_lockout_threshold(3)
            .with_lock_duration_seconds(60)
            .with_session_ttl_seconds(120)
            .with_access_ttl_seconds(30)
            .with_refresh_ttl_seconds(240)
            .with_bcrypt_cost(4);
        assert_eq!(config.lockout_threshold(), 3);
        assert_eq!(config.lock_duration_seconds(), 60);
        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.access_ttl_seconds(), 30);
        assert_eq!(config.refresh_ttl_seconds(), 240);
        assert_eq!(config.bcrypt_cost(), 4);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("access-secret"));
        assert!(!debug.contains("refresh-secret"));
    }
}
