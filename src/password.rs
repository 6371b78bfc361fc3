//! Credential verification over bcrypt.
//!
//! Hashing and verification are synchronous and CPU-bound; the orchestrator
//! runs them on the blocking pool so no lock is held while computing.

use anyhow::{Context, Result};

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
/// Returns an error if the cost is out of bcrypt's accepted range.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("failed to hash password")
}

/// Verify a plaintext password against a stored bcrypt hash.
///
/// The comparison is constant-time with respect to password content; a
/// malformed stored hash is an error, not a mismatch.
///
/// # Errors
/// Returns an error when the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    bcrypt::verify(password, stored_hash).context("failed to verify password")
}

/// Precomputed hash used to equalize timing when no account matches the
/// submitted identifier. Cost must track the configured cost so the dummy
/// comparison stays close to a real one.
pub(crate) fn fallback_hash(cost: u32) -> Result<String> {
    hash_password("custodia.fallback", cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cost 4 keeps the test suite fast; production default is 10.
    const TEST_COST: u32 = 4;

    #[test]
    fn hash_and_verify_round_trip() -> Result<()> {
        let hash = hash_password("hunter2", TEST_COST)?;
        assert!(verify_password("hunter2", &hash)?);
        assert!(!verify_password("hunter3", &hash)?);
        Ok(())
    }

    #[test]
    fn fresh_salt_per_hash() -> Result<()> {
        let first = hash_password("hunter2", TEST_COST)?;
        let second = hash_password("hunter2", TEST_COST)?;
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first)?);
        assert!(verify_password("hunter2", &second)?);
        Ok(())
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("hunter2", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn fallback_hash_never_matches_user_input() -> Result<()> {
        let hash = fallback_hash(TEST_COST)?;
        assert!(!verify_password("hunter2", &hash)?);
        Ok(())
    }
}
