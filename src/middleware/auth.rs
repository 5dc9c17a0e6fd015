use crate::config::JwtKeySource;
use crate::error::{AppError, AppResult};
use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use async_trait::async_trait;
use jwt_security::JwtValidator;
use uuid::Uuid;

/// Turns a presented credential into a verified user id
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AppResult<Uuid>;
}

/// JWT verification backed by the shared `jwt-security` library
#[derive(Debug)]
pub struct JwtTokenVerifier {
    validator: JwtValidator,
}

impl JwtTokenVerifier {
    pub fn new(validator: JwtValidator) -> Self {
        Self { validator }
    }

    pub fn from_key_source(source: &JwtKeySource) -> AppResult<Self> {
        let validator = match source {
            JwtKeySource::Secret(secret) => JwtValidator::from_secret(secret),
            JwtKeySource::RsaPublicKey(pem) => JwtValidator::from_rsa_pem(pem),
        }
        .map_err(|e| AppError::Config(format!("invalid JWT key: {e}")))?;
        Ok(Self::new(validator))
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<Uuid> {
        self.validator.user_id(token).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AppError::Unauthorized
        })
    }
}

/// `Authorization: Bearer <token>` value, if present
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use jwt_security::JwtIssuer;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

    #[tokio::test]
    async fn test_jwt_verifier_accepts_issued_token() {
        let verifier =
            JwtTokenVerifier::from_key_source(&JwtKeySource::Secret(SECRET.to_string())).unwrap();
        let user = Uuid::new_v4();
        let token = JwtIssuer::from_secret(SECRET)
            .unwrap()
            .generate_access_token(user, None)
            .unwrap();

        assert_eq!(verifier.verify(&token).await, Ok(user));
        assert_eq!(verifier.verify("garbage").await, Err(AppError::Unauthorized));
        assert_eq!(verifier.verify("").await, Err(AppError::Unauthorized));
    }

    #[test]
    fn test_short_secret_is_config_error() {
        let result = JwtTokenVerifier::from_key_source(&JwtKeySource::Secret("short".into()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcg=="))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
