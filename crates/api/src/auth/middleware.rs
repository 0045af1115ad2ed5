//! Authorization gate middleware for Axum
//!
//! Every protected route is layered with [`require_access`], parameterized by
//! an [`AccessRequirement`]. The gate runs fully before the handler: an
//! unauthenticated caller gets 401, an authenticated caller without an
//! allowed role gets 403, and only then does the request proceed with an
//! [`AuthUser`] inserted into the request extensions.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{AccessClaims, JwtManager};

/// Canonical allowed-role sets, fixed per endpoint at startup.
pub const ADMIN_ONLY: &[&str] = &["Admin"];
pub const USER_ONLY: &[&str] = &["User"];
pub const USER_OR_ADMIN: &[&str] = &["User", "Admin"];

/// What a route demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequirement {
    /// Public route; the gate passes everything through.
    NoAuth,
    /// Any caller with a valid access token.
    AnyAuthenticated,
    /// Valid token plus a role in the set (matched case-insensitively).
    RequireRoles(&'static [&'static str]),
}

/// Authenticated principal extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl From<&AccessClaims> for AuthUser {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            role: claims.role.clone(),
        }
    }
}

/// State needed by the gate. Token validation is pure given the manager; the
/// role was resolved at issuance, so no store round-trip happens here.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("No role assigned")]
    NoRoleAssigned,
    #[error("Access denied")]
    AccessDenied,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid or expired token",
            ),
            AuthError::NoRoleAssigned => (StatusCode::FORBIDDEN, "forbidden", "No role assigned"),
            AuthError::AccessDenied => (StatusCode::FORBIDDEN, "forbidden", "Access denied"),
        };

        let body = Json(json!({
            "error": error,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Extract a bearer token from the Authorization header.
fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(String::from)
}

/// Case-insensitive role membership check.
pub fn role_allowed(role: &str, allowed: &[&str]) -> bool {
    allowed.iter().any(|a| a.eq_ignore_ascii_case(role))
}

/// Evaluate the gate for an already-validated (or absent) principal.
///
/// Kept separate from the middleware so the full decision matrix is testable
/// without a server.
pub fn evaluate(
    requirement: AccessRequirement,
    claims: Option<&AccessClaims>,
) -> Result<(), AuthError> {
    if requirement == AccessRequirement::NoAuth {
        return Ok(());
    }

    let Some(claims) = claims else {
        return Err(AuthError::MissingAuth);
    };

    match requirement {
        AccessRequirement::NoAuth | AccessRequirement::AnyAuthenticated => Ok(()),
        AccessRequirement::RequireRoles(allowed) => {
            if claims.role.trim().is_empty() {
                return Err(AuthError::NoRoleAssigned);
            }
            if !role_allowed(&claims.role, allowed) {
                return Err(AuthError::AccessDenied);
            }
            Ok(())
        }
    }
}

/// Middleware enforcing an [`AccessRequirement`] before the handler runs.
pub async fn require_access(
    requirement: AccessRequirement,
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_bearer_token(&request);
    let claims = token
        .as_deref()
        .and_then(|t| auth_state.jwt_manager.validate_active(t));

    // A presented-but-invalid token is still a 401, with its own message.
    if requirement != AccessRequirement::NoAuth && token.is_some() && claims.is_none() {
        tracing::debug!(path = %request.uri().path(), "Rejected invalid access token");
        return AuthError::InvalidToken.into_response();
    }

    match evaluate(requirement, claims.as_ref()) {
        Ok(()) => {
            if let Some(claims) = claims.as_ref() {
                request.extensions_mut().insert(AuthUser::from(claims));
            }
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(
                path = %request.uri().path(),
                requirement = ?requirement,
                error = %err,
                "Request rejected by authorization gate"
            );
            err.into_response()
        }
    }
}
