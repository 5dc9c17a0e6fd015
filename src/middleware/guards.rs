//! Request guards for the HTTP read surface

use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};

/// Represents an authenticated user extracted from the bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let token = bearer_token(req).map(str::to_string);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::ServiceUnavailable("application state not configured".into())
            })?;
            let token = token.ok_or(AppError::Unauthorized)?;
            let id = state.verifier.verify(&token).await?;
            Ok(AuthenticatedUser { id })
        })
    }
}
