//! Authentication module for Innkeep

#[cfg(test)]
mod edge_case_tests;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod refresh;
pub mod store;

pub use jwt::{AccessClaims, JwtManager};
pub use middleware::{
    require_access, AccessRequirement, AuthState, AuthUser, ADMIN_ONLY, USER_ONLY, USER_OR_ADMIN,
};
pub use otp::{generate_otp, OtpError, OtpOutcome};
pub use password::{hash_password, verify_password};
pub use refresh::generate_refresh_token;
