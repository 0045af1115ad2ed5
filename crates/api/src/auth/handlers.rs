//! Auth endpoint handlers
//!
//! Register, login, refresh exchange, email verification and the small
//! protected surface that exercises the authorization gate. Authentication
//! failures are deliberately generic; which specific check failed is logged
//! server-side and never exposed to the caller.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        middleware::AuthUser,
        otp::{self, OtpOutcome, OTP_LENGTH},
        password, refresh,
        store::{self, NewUser},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Role assigned to self-registered accounts. Admins are provisioned by
/// operators, not through this endpoint.
const DEFAULT_ROLE: &str = "User";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub is_email_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub is_email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Validation
// =============================================================================

type FieldErrors = HashMap<String, Vec<String>>;

fn push_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

/// Minimal shape check: non-empty local part, one '@', dotted domain.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn validate_register(req: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if req.first_name.trim().is_empty() {
        push_error(&mut errors, "firstName", "First name is required");
    }
    if req.last_name.trim().is_empty() {
        push_error(&mut errors, "lastName", "Last name is required");
    }
    if req.email.trim().is_empty() {
        push_error(&mut errors, "email", "Email is required");
    } else if !is_plausible_email(req.email.trim()) {
        push_error(&mut errors, "email", "Email address is not valid");
    }
    if req.password.len() < 8 {
        push_error(
            &mut errors,
            "password",
            "Password must be at least 8 characters",
        );
    }
    if req.confirm_password != req.password {
        push_error(&mut errors, "confirmPassword", "Passwords do not match");
    }

    errors
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let errors = validate_register(&req);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let email = req.email.trim().to_lowercase();

    if store::find_user_by_email(&state.pool, &email).await?.is_some() {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "email", "Email is already registered");
        return Err(ApiError::Validation(errors));
    }

    let role = store::find_role_by_name(&state.pool, DEFAULT_ROLE)
        .await?
        .ok_or_else(|| {
            tracing::error!(role = DEFAULT_ROLE, "Default role missing from store");
            ApiError::Internal
        })?;

    let password_hash = password::hash_password(&req.password)?;

    let code = otp::generate_otp(OTP_LENGTH).map_err(|e| {
        tracing::error!(error = %e, "OTP generation failed");
        ApiError::Internal
    })?;
    let code_expires_at = otp::expiry(state.config.otp_expiry_minutes);

    let user_id = store::insert_user(
        &state.pool,
        NewUser {
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            email: &email,
            password_hash: &password_hash,
            role_id: role.id,
            verification_otp: &code,
            verification_otp_expires_at: code_expires_at,
        },
    )
    .await
    .map_err(|e| match e {
        // Two registrations racing on the same address: surface the same
        // field error the pre-check would have produced.
        ApiError::Database(db) if is_unique_violation(&db) => {
            let mut errors = FieldErrors::new();
            push_error(&mut errors, "email", "Email is already registered");
            ApiError::Validation(errors)
        }
        other => other,
    })?;

    // Delivery is handled out of band; the code itself is never logged.
    tracing::info!(user_id = %user_id, "User registered, verification code issued");

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user_id,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email,
            role: role.name,
            is_email_verified: false,
        }),
    ))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let Some(user) = store::find_user_by_email(&state.pool, req.email.trim()).await? else {
        tracing::debug!("Login attempt for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !password::verify_password(&req.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Login attempt with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let access_token =
        state
            .jwt_manager
            .generate_access_token(user.id, &user.email, &user.role_name)?;
    let (refresh_token, refresh_expires_at) =
        refresh::generate_refresh_token(state.config.refresh_token_expiration_days)?;

    // Overwrite, not append: one valid refresh token per user at a time.
    store::set_refresh_token(&state.pool, user.id, &refresh_token, refresh_expires_at).await?;

    tracing::info!(user_id = %user.id, "Login successful");

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
    }))
}

/// POST /api/auth/refresh
///
/// Requires the (possibly expired) access token alongside the refresh token:
/// the lenient validation binds the exchange to the original subject.
pub async fn refresh_tokens(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPairResponse>> {
    let claims = state
        .jwt_manager
        .validate_ignoring_expiry(&req.access_token)
        .ok_or(ApiError::InvalidRefresh)?;

    let user = store::find_user_by_id(&state.pool, claims.sub)
        .await?
        .ok_or(ApiError::InvalidRefresh)?;

    let (stored_token, stored_expiry) = match (&user.refresh_token, user.refresh_token_expires_at)
    {
        (Some(token), Some(expiry)) => (token.as_str(), expiry),
        _ => {
            tracing::debug!(user_id = %user.id, "Refresh attempt with no stored token");
            return Err(ApiError::InvalidRefresh);
        }
    };

    if !refresh::tokens_match(&req.refresh_token, stored_token) {
        tracing::warn!(user_id = %user.id, "Refresh token mismatch");
        return Err(ApiError::InvalidRefresh);
    }
    if OffsetDateTime::now_utc() >= stored_expiry {
        tracing::debug!(user_id = %user.id, "Refresh token expired");
        return Err(ApiError::InvalidRefresh);
    }

    // Role is re-resolved from the store on refresh, so a role change takes
    // effect at the next rotation.
    let access_token =
        state
            .jwt_manager
            .generate_access_token(user.id, &user.email, &user.role_name)?;
    let (new_refresh_token, new_expires_at) =
        refresh::generate_refresh_token(state.config.refresh_token_expiration_days)?;

    let rotated = store::rotate_refresh_token(
        &state.pool,
        user.id,
        stored_token,
        &new_refresh_token,
        new_expires_at,
    )
    .await?;

    if !rotated {
        // A concurrent exchange consumed this token first.
        tracing::warn!(user_id = %user.id, "Refresh token already rotated");
        return Err(ApiError::InvalidRefresh);
    }

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token: new_refresh_token,
    }))
}

/// POST /api/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    const INVALID: ApiError =
        ApiError::BadRequest("invalid_otp", "Invalid or expired verification code");

    let Some(user) = store::find_user_by_email(&state.pool, req.email.trim()).await? else {
        return Err(INVALID);
    };

    if user.is_email_verified {
        return Err(ApiError::BadRequest(
            "already_verified",
            "Email is already verified",
        ));
    }

    let (stored_code, expires_at) = match (
        &user.email_verification_otp,
        user.email_verification_otp_expires_at,
    ) {
        (Some(code), Some(expiry)) => (code.as_str(), expiry),
        _ => return Err(INVALID),
    };

    match otp::check(
        req.otp.trim(),
        stored_code,
        expires_at,
        OffsetDateTime::now_utc(),
    ) {
        OtpOutcome::Valid => {
            store::mark_email_verified(&state.pool, user.id).await?;
            tracing::info!(user_id = %user.id, "Email verified");
            Ok(Json(MessageResponse {
                message: "Email verified",
            }))
        }
        // A wrong guess leaves the stored code intact; only expiry or an
        // explicit resend replaces it.
        OtpOutcome::Mismatch | OtpOutcome::Expired => Err(INVALID),
    }
}

/// POST /api/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendVerificationRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let Some(user) = store::find_user_by_email(&state.pool, req.email.trim()).await? else {
        return Err(ApiError::NotFound);
    };

    if user.is_email_verified {
        return Err(ApiError::BadRequest(
            "already_verified",
            "Email is already verified",
        ));
    }

    let code = otp::generate_otp(OTP_LENGTH).map_err(|e| {
        tracing::error!(error = %e, "OTP generation failed");
        ApiError::Internal
    })?;
    let expires_at = otp::expiry(state.config.otp_expiry_minutes);

    store::set_verification_otp(&state.pool, user.id, &code, expires_at).await?;

    tracing::info!(user_id = %user.id, "Verification code regenerated");

    Ok(Json(MessageResponse {
        message: "Verification code sent",
    }))
}

/// GET /api/auth/me: current principal, any authenticated caller.
pub async fn me(Extension(auth_user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth_user.user_id,
        email: auth_user.email,
        role: auth_user.role,
    })
}

/// GET /api/admin/users: Admin-only listing.
pub async fn list_users(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AdminUserSummary>>> {
    let rows = store::list_users(&state.pool).await?;

    let users = rows
        .into_iter()
        .map(|row| AdminUserSummary {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role: row.role_name,
            is_email_verified: row.is_email_verified,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(users))
}
