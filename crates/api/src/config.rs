//! Environment-driven configuration

use anyhow::{bail, Context};

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// HMAC-SHA256 signing secret for access tokens. Required, non-empty.
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration_minutes: i64,
    pub refresh_token_expiration_days: i64,
    pub otp_expiry_minutes: i64,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// A missing or empty `JWT_SECRET` is a fatal configuration error here,
    /// never a per-request failure.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must be set to a non-empty value");
        }

        Ok(Self {
            database_url,
            bind_address: env_or("BIND_ADDRESS", "0.0.0.0:8080"),
            jwt_secret,
            jwt_issuer: env_or("JWT_ISSUER", "innkeep"),
            jwt_audience: env_or("JWT_AUDIENCE", "innkeep-backoffice"),
            access_token_expiration_minutes: env_i64("ACCESS_TOKEN_EXPIRATION_MINUTES", 15)?,
            refresh_token_expiration_days: env_i64("REFRESH_TOKEN_EXPIRATION_DAYS", 30)?,
            otp_expiry_minutes: env_i64("OTP_EXPIRY_MINUTES", 10)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_i64(key: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
