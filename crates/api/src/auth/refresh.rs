//! Opaque refresh tokens
//!
//! A refresh token is 64 cryptographically-random bytes, base64-encoded. It
//! carries no claims; the stored copy on the user row is the single source of
//! truth, and overwriting it is what makes each token single-use.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, TryRngCore};
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

use crate::error::{ApiError, ApiResult};

const REFRESH_TOKEN_BYTES: usize = 64;

/// Draw a new refresh token and its expiry timestamp.
///
/// The caller persists the pair against the user record, overwriting any
/// prior value.
pub fn generate_refresh_token(ttl_days: i64) -> ApiResult<(String, OffsetDateTime)> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!(error = ?e, "OS RNG unavailable");
        ApiError::Internal
    })?;

    let token = STANDARD.encode(bytes);
    let expires_at = OffsetDateTime::now_utc() + Duration::days(ttl_days);

    Ok((token, expires_at))
}

/// Constant-time comparison of a presented refresh token against the stored
/// value. Length mismatch compares unequal without early exit.
pub fn tokens_match(presented: &str, stored: &str) -> bool {
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_base64_of_64_bytes() {
        let (token, _) = generate_refresh_token(30).unwrap();
        // 64 bytes -> 88 base64 characters (with padding)
        assert_eq!(token.len(), 88);
        assert_eq!(STANDARD.decode(&token).unwrap().len(), 64);
    }

    #[test]
    fn tokens_are_unique() {
        let (a, _) = generate_refresh_token(30).unwrap();
        let (b, _) = generate_refresh_token(30).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_is_days_in_the_future() {
        let before = OffsetDateTime::now_utc();
        let (_, expires_at) = generate_refresh_token(30).unwrap();
        let days = (expires_at - before).whole_days();
        assert!((29..=30).contains(&days));
    }

    #[test]
    fn match_is_exact() {
        let (token, _) = generate_refresh_token(30).unwrap();
        assert!(tokens_match(&token, &token));
        assert!(!tokens_match(&token, &token[..87]));
        assert!(!tokens_match(&token, "something-else-entirely"));
    }
}
