use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::auth::{jwt::TokenError, password::HashingError, repo::StoreError};

/// Every failure that can leave a request handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("A user with this email already exists")]
    AlreadyExists,

    /// Deliberately identical for unknown email and wrong password.
    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error(transparent)]
    Signing(TokenError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            // lost a registration race against another insert
            StoreError::Conflict => AppError::AlreadyExists,
            other => AppError::Store(other),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Unauthenticated("Token has expired".into()),
            TokenError::Invalid => AppError::Unauthenticated("Invalid token".into()),
            TokenError::Signing(_) => AppError::Signing(err),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Hashing(_) | AppError::Signing(_) | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::AlreadyExists => "ALREADY_EXISTS",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Hashing(_) | AppError::Signing(_) | AppError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show the caller; internal causes stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Hashing(_) | AppError::Signing(_) | AppError::Store(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Hashing(_) | AppError::Signing(_) | AppError::Store(_) => {
                error!(error = %self, "internal error");
            }
            AppError::AlreadyExists => warn!("{}", self),
            AppError::InvalidCredentials | AppError::Unauthenticated(_) | AppError::Forbidden => {
                info!(code = self.code(), "auth rejected: {}", self);
            }
            AppError::Validation(_) | AppError::NotFound(_) => debug!("client error: {}", self),
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.user_message(),
        }));
        (self.status_code(), body).into_response()
    }
}
