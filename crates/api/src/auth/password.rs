//! Password hashing
//!
//! Argon2id with a per-password random salt. Plaintext passwords are never
//! stored or logged; verification is constant-time within the hasher.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{ApiError, ApiResult};

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "Password hashing failed");
            ApiError::Internal
        })?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash.
///
/// A malformed stored hash verifies as false rather than erroring; the caller
/// has one uniform rejection path.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::debug!("Stored password hash could not be parsed");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_not_the_plaintext() {
        let hash = hash_password("Sup3r$ecret!").unwrap();
        assert_ne!(hash, "Sup3r$ecret!");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn verify_accepts_correct_password() {
        let hash = hash_password("Sup3r$ecret!").unwrap();
        assert!(verify_password("Sup3r$ecret!", &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("Sup3r$ecret!").unwrap();
        assert!(!verify_password("sup3r$ecret!", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("Sup3r$ecret!").unwrap();
        let b = hash_password("Sup3r$ecret!").unwrap();
        assert_ne!(a, b, "salts must differ");
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
