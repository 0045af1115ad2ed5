//! Email-verification OTP codes
//!
//! Six-digit numeric codes with a short expiry, independent of the token
//! system. The length is a fixed policy: anything other than six digits is
//! rejected at generation time.

use rand::{rngs::OsRng, TryRngCore};
use time::{Duration, OffsetDateTime};

/// The only supported code length.
pub const OTP_LENGTH: usize = 6;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("unsupported OTP length {0}, only {OTP_LENGTH} is allowed")]
    UnsupportedLength(usize),
    #[error("random source unavailable")]
    Rng,
}

/// Outcome of checking a submitted code against the stored one.
///
/// A `Mismatch` must not invalidate the stored code; only expiry or an
/// explicit resend replaces it.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpOutcome {
    Valid,
    Mismatch,
    Expired,
}

/// Generate a cryptographically random, zero-padded 6-digit code.
pub fn generate_otp(length: usize) -> Result<String, OtpError> {
    if length != OTP_LENGTH {
        return Err(OtpError::UnsupportedLength(length));
    }

    // Rejection-sample so the modulo does not bias low digits.
    const LIMIT: u32 = (u32::MAX / 1_000_000) * 1_000_000;
    loop {
        let mut bytes = [0u8; 4];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| OtpError::Rng)?;
        let value = u32::from_be_bytes(bytes);
        if value < LIMIT {
            return Ok(format!("{:06}", value % 1_000_000));
        }
    }
}

/// Expiry timestamp for a freshly issued code.
pub fn expiry(minutes: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::minutes(minutes)
}

/// Check a submitted code: exact match and `now < expires_at` must both hold.
pub fn check(
    submitted: &str,
    stored: &str,
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
) -> OtpOutcome {
    if now >= expires_at {
        return OtpOutcome::Expired;
    }
    if submitted == stored {
        OtpOutcome::Valid
    } else {
        OtpOutcome::Mismatch
    }
}
