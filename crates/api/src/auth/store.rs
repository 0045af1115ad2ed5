//! Credential store queries
//!
//! All user/role persistence for the auth flow lives here as single-row
//! reads and writes. Refresh-token rotation is a compare-and-swap UPDATE so
//! two concurrent exchanges for the same user cannot both succeed.

use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

/// Full user row joined with the role name.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_name: String,
    pub refresh_token: Option<String>,
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    pub is_email_verified: bool,
    pub email_verification_otp: Option<String>,
    pub email_verification_otp_expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, FromRow)]
pub struct RoleRow {
    pub id: Uuid,
    pub name: String,
}

/// Summary row for the admin user listing.
#[derive(Debug, FromRow)]
pub struct UserSummaryRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role_name: String,
    pub is_email_verified: bool,
    pub created_at: OffsetDateTime,
}

/// Fields for a new user record. The password is already hashed and the
/// email already lowercased by the caller.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role_id: Uuid,
    pub verification_otp: &'a str,
    pub verification_otp_expires_at: OffsetDateTime,
}

const USER_COLUMNS: &str = r#"
    u.id,
    u.first_name,
    u.last_name,
    u.email,
    u.password_hash,
    r.name AS role_name,
    u.refresh_token,
    u.refresh_token_expires_at,
    u.is_email_verified,
    u.email_verification_otp,
    u.email_verification_otp_expires_at
"#;

/// Look up a user by email. Lookup is case-insensitive; the stored address
/// is lowercased at registration so the functional index matches.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> ApiResult<Option<UserRow>> {
    let query = format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE LOWER(u.email) = LOWER($1)
        "#
    );

    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> ApiResult<Option<UserRow>> {
    let query = format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users u
        JOIN roles r ON r.id = u.role_id
        WHERE u.id = $1
        "#
    );

    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_role_by_name(pool: &PgPool, name: &str) -> ApiResult<Option<RoleRow>> {
    let row = sqlx::query_as::<_, RoleRow>("SELECT id, name FROM roles WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Insert a new user and return its id.
pub async fn insert_user(pool: &PgPool, user: NewUser<'_>) -> ApiResult<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (
            first_name, last_name, email, password_hash, role_id,
            email_verification_otp, email_verification_otp_expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.role_id)
    .bind(user.verification_otp)
    .bind(user.verification_otp_expires_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Overwrite the stored refresh token and expiry. Used on login, where any
/// prior token is unconditionally invalidated.
pub async fn set_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    expires_at: OffsetDateTime,
) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET refresh_token = $2,
            refresh_token_expires_at = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Rotate the refresh token only if the stored value still equals
/// `current_token`. Returns false when another exchange already consumed it,
/// which is the single-use guarantee under concurrent refresh attempts.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    current_token: &str,
    new_token: &str,
    new_expires_at: OffsetDateTime,
) -> ApiResult<bool> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE users
        SET refresh_token = $3,
            refresh_token_expires_at = $4,
            updated_at = NOW()
        WHERE id = $1
          AND refresh_token = $2
        "#,
    )
    .bind(user_id)
    .bind(current_token)
    .bind(new_token)
    .bind(new_expires_at)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Overwrite the verification OTP and expiry (registration resend).
pub async fn set_verification_otp(
    pool: &PgPool,
    user_id: Uuid,
    code: &str,
    expires_at: OffsetDateTime,
) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_verification_otp = $2,
            email_verification_otp_expires_at = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(code)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark the email verified and clear both OTP columns together.
pub async fn mark_email_verified(pool: &PgPool, user_id: Uuid) -> ApiResult<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET is_email_verified = TRUE,
            email_verification_otp = NULL,
            email_verification_otp_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_users(pool: &PgPool) -> ApiResult<Vec<UserSummaryRow>> {
    let rows = sqlx::query_as::<_, UserSummaryRow>(
        r#"
        SELECT
            u.id,
            u.first_name,
            u.last_name,
            u.email,
            r.name AS role_name,
            u.is_email_verified,
            u.created_at
        FROM users u
        JOIN roles r ON r.id = u.role_id
        ORDER BY u.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    /// Setup test database pool. Tests that need one skip themselves when
    /// DATABASE_URL is not set, so the unit suite runs without Postgres.
    async fn setup_test_pool() -> Option<PgPool> {
        let database_url = std::env::var("DATABASE_URL").ok()?;

        let pool = innkeep_shared::create_pool(&database_url)
            .await
            .expect("Failed to connect to test database");
        innkeep_shared::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        Some(pool)
    }

    async fn insert_test_user(pool: &PgPool, expires: OffsetDateTime) -> Uuid {
        let role = find_role_by_name(pool, "User")
            .await
            .expect("Role query failed")
            .expect("Seeded User role missing");

        insert_user(
            pool,
            NewUser {
                first_name: "Test",
                last_name: "User",
                email: &format!("rotation-{}@example.com", Uuid::new_v4()),
                password_hash: "not-a-real-hash",
                role_id: role.id,
                verification_otp: "000000",
                verification_otp_expires_at: expires,
            },
        )
        .await
        .expect("Insert failed")
    }

    #[tokio::test]
    async fn test_consumed_refresh_token_cannot_rotate_again() {
        let Some(pool) = setup_test_pool().await else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return;
        };

        let expires = OffsetDateTime::now_utc() + Duration::days(7);
        let user_id = insert_test_user(&pool, expires).await;

        set_refresh_token(&pool, user_id, "token-one", expires)
            .await
            .expect("Failed to store refresh token");

        // First exchange wins the compare-and-swap and installs token-two.
        let rotated = rotate_refresh_token(&pool, user_id, "token-one", "token-two", expires)
            .await
            .expect("Rotation query failed");
        assert!(rotated, "Fresh token should rotate");

        // Replaying the consumed token must fail and leave token-two intact.
        let replayed = rotate_refresh_token(&pool, user_id, "token-one", "token-three", expires)
            .await
            .expect("Rotation query failed");
        assert!(!replayed, "Consumed token must not rotate a second time");

        let user = find_user_by_id(&pool, user_id)
            .await
            .expect("Lookup failed")
            .expect("User should exist");
        assert_eq!(user.refresh_token.as_deref(), Some("token-two"));

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
            .expect("Cleanup failed");
    }

    #[tokio::test]
    async fn test_rotate_with_wrong_token_leaves_row_unchanged() {
        let Some(pool) = setup_test_pool().await else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return;
        };

        let expires = OffsetDateTime::now_utc() + Duration::days(7);
        let user_id = insert_test_user(&pool, expires).await;

        set_refresh_token(&pool, user_id, "token-one", expires)
            .await
            .expect("Failed to store refresh token");

        let rotated = rotate_refresh_token(&pool, user_id, "never-issued", "token-two", expires)
            .await
            .expect("Rotation query failed");
        assert!(!rotated, "Unknown token must not rotate");

        let user = find_user_by_id(&pool, user_id)
            .await
            .expect("Lookup failed")
            .expect("User should exist");
        assert_eq!(user.refresh_token.as_deref(), Some("token-one"));

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
            .expect("Cleanup failed");
    }
}
