//! Password hashing
//!
//! Argon2id digests in PHC string format. Verification goes through the
//! `password-hash` verifier, which compares outputs in constant time.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{AuthError, AuthResult};

/// Hash a plaintext password with a fresh random salt.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if the hasher rejects its parameters or input.
pub fn hash_password(plaintext: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a plaintext password against a stored digest.
///
/// Malformed digests never match; they do not produce an error.
pub fn verify_password(digest: &str, plaintext: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password digest is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let digest = hash_password("pw").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(verify_password(&digest, "pw"));
        assert!(!verify_password(&digest, "pW"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();

        assert_ne!(first, second);
        assert!(verify_password(&first, "same"));
        assert!(verify_password(&second, "same"));
    }

    #[test]
    fn test_verify_is_deterministic() {
        let digest = hash_password("correct horse").unwrap();

        for _ in 0..3 {
            assert!(verify_password(&digest, "correct horse"));
            assert!(!verify_password(&digest, "battery staple"));
        }
    }

    #[test]
    fn test_malformed_digest_is_false() {
        assert!(!verify_password("", "pw"));
        assert!(!verify_password("not-a-phc-string", "pw"));
        assert!(!verify_password("$2a$10$bcryptlookingdigest", "pw"));
    }
}
