use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

/// Checks an HS256 bearer token and returns the user it was issued to.
///
/// Only `app_metadata` is kept: it is server-controlled, while users can
/// rewrite their own `user_metadata`, so profile links never come from it.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err("Invalid token format".to_string());
    };

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| "Invalid claims encoding".to_string())?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.app_metadata,
        created_at,
    };

    debug!("Token validated for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use assert_matches::assert_matches;
    use serde_json::{json, Value};
    use shared_models::auth::Actor;
    use shared_models::error::AppError;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn valid_token_carries_profile_link() {
        let patient_id = Uuid::new_v4();
        let test_user = TestUser::patient("p@example.com", patient_id);
        let token = JwtTestUtils::create_test_token(&test_user, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, test_user.id);
        assert_eq!(user.role.as_deref(), Some("patient"));
        assert_eq!(
            user.metadata.unwrap()["patient_id"],
            Value::String(patient_id.to_string())
        );
    }

    #[test]
    fn rejects_bad_signature_expiry_and_shape() {
        let test_user = TestUser::staff("s@example.com");

        let wrong = JwtTestUtils::create_invalid_signature_token(&test_user);
        assert_eq!(validate_token(&wrong, SECRET).unwrap_err(), "Invalid token signature");

        let expired = JwtTestUtils::create_expired_token(&test_user, SECRET);
        assert_eq!(validate_token(&expired, SECRET).unwrap_err(), "Token expired");

        assert_eq!(
            validate_token("not-a-token", SECRET).unwrap_err(),
            "Invalid token format"
        );
        assert!(validate_token(&wrong, "").is_err());
    }

    #[test]
    fn user_editable_metadata_cannot_link_a_profile() {
        let someone_else = Uuid::new_v4();
        let token = JwtTestUtils::create_token_with_claims(
            &json!({
                "sub": "user-7",
                "role": "patient",
                "app_metadata": { "provider": "email" },
                "user_metadata": { "patient_id": someone_else.to_string() },
                "exp": Utc::now().timestamp() + 3600
            }),
            SECRET,
        );

        let user = validate_token(&token, SECRET).unwrap();
        assert!(user.metadata.unwrap().get("patient_id").is_none());

        let user = validate_token(&token, SECRET).unwrap();
        assert_matches!(Actor::from_user(&user), Err(AppError::Forbidden(_)));
    }
}
