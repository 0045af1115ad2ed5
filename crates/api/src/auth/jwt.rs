//! Access-token issuance and validation
//!
//! Tokens are HMAC-SHA256 signed JWTs carrying the user id and role. Strict
//! validation (`validate_active`) checks signature, issuer, audience and
//! expiry with zero clock-skew tolerance. The lenient path
//! (`validate_ignoring_expiry`) exists only for the refresh exchange, where
//! an expired-but-otherwise-valid token is an expected input.
//!
//! Both validators return `None` on any failure; rejection never surfaces as
//! an error to callers.

use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    /// Role name resolved at issuance time, e.g. "Admin" or "User". A token
    /// without this claim validates with an empty role so the gate can answer
    /// 403 instead of treating it as unauthenticated.
    #[serde(default)]
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Issues and validates access tokens for a single signing secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_token_minutes: i64,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: &str, audience: &str, access_token_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_token_minutes,
        }
    }

    /// Mint a signed access token for the given user. No side effects beyond
    /// token construction.
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
    ) -> ApiResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + self.access_token_minutes * 60,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = ?e, "Failed to sign access token");
            ApiError::Internal
        })
    }

    /// Full validation: signature, issuer, audience and expiry, with zero
    /// clock-skew leeway. Used to authorize ordinary requests.
    pub fn validate_active(&self, token: &str) -> Option<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        match decode::<AccessClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = ?e, "Access token rejected");
                None
            }
        }
    }

    /// Validation for the refresh exchange only: signature, issuer and
    /// audience are checked but expiry is skipped. Tokens whose header
    /// declares any algorithm other than HS256 are rejected before decoding,
    /// so a forged `alg` cannot downgrade the check.
    pub fn validate_ignoring_expiry(&self, token: &str) -> Option<AccessClaims> {
        match decode_header(token) {
            Ok(header) if header.alg == Algorithm::HS256 => {}
            Ok(header) => {
                tracing::warn!(alg = ?header.alg, "Rejected token with unexpected algorithm");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = ?e, "Malformed token header");
                return None;
            }
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.required_spec_claims.remove("exp");
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        match decode::<AccessClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = ?e, "Token rejected on refresh path");
                None
            }
        }
    }
}
