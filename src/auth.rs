//! Authentication: validation of identity-provider access tokens
//!
//! Tokens are issued outside the worker (HS256, shared `JWT_SECRET`); the
//! worker only checks them and reads the staff role.

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Request, StaffRole};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    #[serde(default)]
    pub email: String,
    /// Staff role (admin, petugas, dispatcher)
    pub role: String,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub email: String,
    pub role: StaffRole,
}

impl AuthInfo {
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin
    }
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request.
///
/// The token must be valid and carry a known staff role.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("No authentication provided, JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;
    let role = StaffRole::parse(&claims.role)
        .ok_or_else(|| anyhow!("Unknown role in token: {}", claims.role))?;

    Ok(AuthInfo {
        user_id,
        email: claims.email,
        role,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    /// Sign a token the way the identity provider does
    fn issue_token(user_id: Uuid, role: &str, secret: &str) -> String {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            email: "petugas@polda.id".to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + 8 * 60 * 60,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn request(token: Option<String>) -> Request<serde_json::Value> {
        Request {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_validate_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let claims = validate_token(&issue_token(user_id, "dispatcher", TEST_SECRET), TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "dispatcher");
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token = issue_token(Uuid::new_v4(), "admin", TEST_SECRET);
        assert!(validate_token(&token, "wrong-secret-wrong-secret-wrong-secret").is_err());
    }

    #[test]
    fn test_validate_token_malformed() {
        assert!(validate_token("not.a.valid.token", TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_reads_role() {
        let user_id = Uuid::new_v4();
        let auth = extract_auth(&request(Some(issue_token(user_id, "admin", TEST_SECRET))), TEST_SECRET).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert!(auth.is_admin());

        let auth = extract_auth(&request(Some(issue_token(user_id, "petugas", TEST_SECRET))), TEST_SECRET).unwrap();
        assert_eq!(auth.role, StaffRole::Petugas);
        assert!(!auth.is_admin());
    }

    #[test]
    fn test_extract_auth_rejects_unknown_role() {
        let token = issue_token(Uuid::new_v4(), "customer", TEST_SECRET);
        assert!(extract_auth(&request(Some(token)), TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        assert!(extract_auth(&request(None), TEST_SECRET).is_err());
    }
}
