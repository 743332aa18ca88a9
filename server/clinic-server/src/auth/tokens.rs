//! JWT session tokens
//!
//! Tokens are HS256-signed and carry the numeric user id in an `id` claim,
//! which is what the frontend has always stored and sent back.

use crate::error::ApiError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// JWT TOKEN CLAIMS
// =============================================================================

/// JWT token claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// User ID
    pub id: i32,

    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,

    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
}

impl TokenClaims {
    /// Create claims valid for `ttl_hours` from now
    pub fn new(user_id: i32, ttl_hours: i64) -> Result<Self, ApiError> {
        let now = Utc::now();
        let exp = Duration::try_hours(ttl_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                ApiError::internal(format!("Token lifetime out of range: {} hours", ttl_hours))
            })?;

        Ok(Self {
            id: user_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }
}

// =============================================================================
// JWT SERVICE
// =============================================================================

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct JwtService {
    keys: Arc<Keys>,
    ttl_hours: i64,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_hours", &self.ttl_hours)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            ttl_hours,
        }
    }

    /// Sign a token for the given user
    pub fn issue(&self, user_id: i32) -> Result<String, ApiError> {
        self.encode_claims(&TokenClaims::new(user_id, self.ttl_hours)?)
    }

    pub(crate) fn encode_claims(&self, claims: &TokenClaims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        decode::<TokenClaims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ApiError::authentication("Token inválido")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 168)
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = service();
        let token = jwt.issue(42).unwrap();
        let claims = jwt.verify(&token).unwrap();

        assert_eq!(claims.id, 42);
        assert_eq!(claims.exp - claims.iat, 168 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service().issue(1).unwrap();
        let err = JwtService::new("other-secret", 168).verify(&token).unwrap_err();
        assert_eq!(err.to_string(), "Token inválido");
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let token = jwt
            .encode_claims(&TokenClaims {
                id: 1,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let err = JwtService::new("test-secret", 3_000_000_000).issue(1).unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));

        assert!(TokenClaims::new(1, i64::MAX).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(service().verify("not.a.token").is_err());
        assert!(service().verify("").is_err());
    }
}
