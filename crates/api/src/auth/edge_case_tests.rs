//! Edge case tests for the token system
//!
//! Boundary conditions around expiry, the lenient refresh-path validation,
//! and algorithm substitution.

#[cfg(test)]
mod jwt_edge_tests {
    use super::super::jwt::{AccessClaims, JwtManager};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use time::OffsetDateTime;
    use uuid::Uuid;

    const TEST_SECRET: &str = "test-secret-key-at-least-32-chars!";
    const TEST_ISSUER: &str = "innkeep-test";
    const TEST_AUDIENCE: &str = "innkeep-test-clients";

    fn test_manager(minutes: i64) -> JwtManager {
        JwtManager::new(TEST_SECRET, TEST_ISSUER, TEST_AUDIENCE, minutes)
    }

    fn forged_claims(sub: Uuid) -> AccessClaims {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        AccessClaims {
            sub,
            email: "forged@example.com".to_string(),
            role: "Admin".to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            iat: now,
            nbf: now,
            exp: now + 900,
        }
    }

    // =========================================================================
    // Expired token: rejected by the strict validator, accepted by the
    // lenient one with the same signature.
    // =========================================================================
    #[test]
    fn test_expired_token_fails_active_but_passes_lenient() {
        let manager = test_manager(0);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_access_token(user_id, "alice@example.com", "User")
            .expect("Should generate token");

        // With a zero-minute TTL the token expires as soon as the clock
        // ticks past the issuance second; leeway is zero.
        std::thread::sleep(std::time::Duration::from_secs(2));

        assert!(manager.validate_active(&token).is_none());

        let claims = manager
            .validate_ignoring_expiry(&token)
            .expect("Lenient validation must accept an expired token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "User");
    }

    // =========================================================================
    // Fresh token passes both validators.
    // =========================================================================
    #[test]
    fn test_fresh_token_passes_both_validators() {
        let manager = test_manager(15);
        let token = manager
            .generate_access_token(Uuid::new_v4(), "alice@example.com", "Admin")
            .expect("Should generate token");

        assert!(manager.validate_active(&token).is_some());
        assert!(manager.validate_ignoring_expiry(&token).is_some());
    }

    // =========================================================================
    // Algorithm substitution: a token signed with the right secret but the
    // wrong algorithm must be rejected on the lenient path too.
    // =========================================================================
    #[test]
    fn test_lenient_path_rejects_substituted_algorithm() {
        let manager = test_manager(15);
        let claims = forged_claims(Uuid::new_v4());

        let hs384_token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("Should sign test token");

        assert!(manager.validate_ignoring_expiry(&hs384_token).is_none());
        assert!(manager.validate_active(&hs384_token).is_none());
    }

    // =========================================================================
    // Tampered payload fails signature verification everywhere.
    // =========================================================================
    #[test]
    fn test_tampered_payload_is_rejected() {
        let manager = test_manager(15);
        let token = manager
            .generate_access_token(Uuid::new_v4(), "alice@example.com", "User")
            .expect("Should generate token");

        // Swap the payload segment for one claiming Admin, keep the original
        // signature.
        let forged_payload = {
            use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
            let claims = forged_claims(Uuid::new_v4());
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("Should serialize"))
        };

        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(manager.validate_active(&tampered).is_none());
        assert!(manager.validate_ignoring_expiry(&tampered).is_none());
    }

    // =========================================================================
    // Not-before in the future is rejected by the strict validator.
    // =========================================================================
    #[test]
    fn test_future_nbf_is_rejected() {
        let manager = test_manager(15);
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            email: "early@example.com".to_string(),
            role: "User".to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            iat: now,
            nbf: now + 3600,
            exp: now + 7200,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("Should sign test token");

        assert!(manager.validate_active(&token).is_none());
    }

    // =========================================================================
    // Expiry is minutes-based and lands where configured.
    // =========================================================================
    #[test]
    fn test_expiry_matches_configured_minutes() {
        let manager = test_manager(15);
        let token = manager
            .generate_access_token(Uuid::new_v4(), "alice@example.com", "User")
            .expect("Should generate token");

        let claims = manager
            .validate_active(&token)
            .expect("Fresh token should validate");

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let expected_exp = now + 15 * 60;
        assert!(
            (claims.exp - expected_exp).abs() < 5,
            "exp should be ~15 minutes out"
        );
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }
}
