use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("recipient unreachable")]
    Unreachable,

    #[error("not found")]
    NotFound,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Persistence(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::StartServer(_) => "START_SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::Unreachable => "UNREACHABLE",
            AppError::NotFound => "NOT_FOUND",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Text sent to the initiating connection in an `error` event.
    ///
    /// Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Forbidden => "You are not allowed to perform this action".to_string(),
            AppError::Unreachable => "recipient unreachable".to_string(),
            AppError::NotFound => "message not found".to_string(),
            AppError::Unauthorized => "unauthorized".to_string(),
            AppError::BadRequest(reason) => reason.clone(),
            AppError::Persistence(_) => "message storage unavailable".to_string(),
            AppError::ServiceUnavailable(_) => "service unavailable".to_string(),
            AppError::Config(_) | AppError::StartServer(_) => "internal error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unreachable => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) | AppError::Config(_) | AppError::StartServer(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.error_code(),
            message: self.client_message(),
        })
    }
}
