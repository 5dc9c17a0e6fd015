//! JWT validation for chat connections
//!
//! Identity issuance lives outside this workspace. Services only need to
//! turn a presented bearer token into a verified user id, so the validator
//! is the primary type here. `JwtIssuer` exists for local tooling and tests.
//!
//! Supported algorithms:
//! - HS256 with a shared secret (minimum 32 bytes)
//! - RS256 with a PEM public key

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_VALIDATION_LEEWAY: u64 = 30; // 30 seconds clock skew tolerance
const MAX_IAT_FUTURE_SKEW_SECS: i64 = 300;
const MIN_SECRET_LEN: usize = 32;
const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 1;

/// Claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).context("Invalid user ID in token - malformed UUID")
    }
}

/// Validates bearer tokens against a single verification key
#[derive(Clone)]
pub struct JwtValidator {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// HS256 validator from a shared secret
    pub fn from_secret(secret: &str) -> Result<Self> {
        validate_secret_strength(secret)?;
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
        })
    }

    /// RS256 validator from a PEM encoded public key
    pub fn from_rsa_pem(public_key_pem: &str) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .context("Failed to parse RSA public key - invalid PEM format")?;
        Ok(Self {
            key,
            algorithm: Algorithm::RS256,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Validate signature, expiry and issue time
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        if token.trim().is_empty() {
            return Err(anyhow!("Empty token"));
        }

        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = DEFAULT_VALIDATION_LEEWAY;

        let token_data = decode::<Claims>(token, &self.key, &validation)
            .map_err(|e| anyhow!("Token validation failed: {}", e))?;

        let now = Utc::now().timestamp();
        if token_data.claims.iat > now + MAX_IAT_FUTURE_SKEW_SECS {
            return Err(anyhow!(
                "Token issued in future - possible clock skew or tampering"
            ));
        }

        Ok(token_data)
    }

    /// Validate and return the subject as a user id
    pub fn user_id(&self, token: &str) -> Result<Uuid> {
        let token_data = self.validate_token(token)?;
        token_data.claims.user_id()
    }
}

/// Signs HS256 access tokens
pub struct JwtIssuer {
    key: EncodingKey,
}

impl JwtIssuer {
    pub fn from_secret(secret: &str) -> Result<Self> {
        validate_secret_strength(secret)?;
        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Generate access token (1 hour expiry)
    pub fn generate_access_token(&self, user_id: Uuid, email: Option<&str>) -> Result<String> {
        self.generate_token(user_id, email, Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS))
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            email: email.map(str::to_string),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .context("Failed to encode JWT token")
    }
}

/// Reject HS256 secrets too short to resist brute force
pub fn validate_secret_strength(secret: &str) -> Result<()> {
    if secret.len() < MIN_SECRET_LEN {
        tracing::error!(
            length = secret.len(),
            minimum = MIN_SECRET_LEN,
            "JWT secret rejected"
        );
        return Err(anyhow!(
            "JWT secret too short - minimum {} bytes required",
            MIN_SECRET_LEN
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn test_issue_and_validate_roundtrip() {
        let issuer = JwtIssuer::from_secret(SECRET).unwrap();
        let validator = JwtValidator::from_secret(SECRET).unwrap();
        assert_eq!(validator.algorithm(), Algorithm::HS256);
        let user_id = Uuid::new_v4();

        let token = issuer
            .generate_access_token(user_id, Some("a@example.com"))
            .unwrap();

        assert_eq!(validator.user_id(&token).unwrap(), user_id);
        let data = validator.validate_token(&token).unwrap();
        assert_eq!(data.claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let issuer = JwtIssuer::from_secret("another-secret-that-is-also-long-enough").unwrap();
        let validator = JwtValidator::from_secret(SECRET).unwrap();

        let token = issuer.generate_access_token(Uuid::new_v4(), None).unwrap();
        assert!(validator.validate_token(&token).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let issuer = JwtIssuer::from_secret(SECRET).unwrap();
        let validator = JwtValidator::from_secret(SECRET).unwrap();

        let token = issuer
            .generate_token(Uuid::new_v4(), None, Duration::hours(-2))
            .unwrap();
        assert!(validator.validate_token(&token).is_err());
    }

    #[test]
    fn test_rejects_malformed_and_empty_tokens() {
        let validator = JwtValidator::from_secret(SECRET).unwrap();
        assert!(validator.validate_token("").is_err());
        assert!(validator.validate_token("header.payload").is_err());
        assert!(validator.validate_token("invalid_jwt_token_123").is_err());
    }

    #[test]
    fn test_rejects_non_uuid_subject() {
        let now = Utc::now();
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            email: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let validator = JwtValidator::from_secret(SECRET).unwrap();
        assert!(validator.validate_token(&token).is_ok());
        assert!(validator.user_id(&token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtValidator::from_secret("short").is_err());
        assert!(JwtIssuer::from_secret("short").is_err());
    }
}
