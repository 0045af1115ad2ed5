//! Router composition
//!
//! Each protected route group is layered with the authorization gate,
//! parameterized by the allowed-role set it demands. The sets are fixed here
//! at startup; nothing about the gate is dynamic per request.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::{
    auth::{handlers, require_access, AccessRequirement, AuthState, ADMIN_ONLY},
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    let public = Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh_tokens))
        .route("/api/auth/verify-email", post(handlers::verify_email))
        .route(
            "/api/auth/resend-verification",
            post(handlers::resend_verification),
        );

    let authenticated = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            |state: State<AuthState>, request: Request, next: Next| {
                require_access(AccessRequirement::AnyAuthenticated, state, request, next)
            },
        ));

    let admin = Router::new()
        .route("/api/admin/users", get(handlers::list_users))
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            |state: State<AuthState>, request: Request, next: Next| {
                require_access(
                    AccessRequirement::RequireRoles(ADMIN_ONLY),
                    state,
                    request,
                    next,
                )
            },
        ));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
