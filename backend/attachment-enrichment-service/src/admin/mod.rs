//! HTTP surface: upload hook, admin label endpoints, attachment search
pub mod handlers;
pub mod token;

use crate::storage::StorageError;
use crate::EnrichmentError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;

pub use handlers::{configure, AdminState};
pub use token::{TokenAction, TokenError, TokenSigner};

/// Admin error types
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: invalid or expired token")]
    InvalidToken,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    status: u16,
}

impl ResponseError for AdminError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::InvalidToken => StatusCode::FORBIDDEN,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            AdminError::BadRequest(_) => "validation_error",
            AdminError::InvalidToken => "authorization_error",
            AdminError::NotFound(_) => "not_found_error",
            AdminError::Internal(_) => "server_error",
        };

        HttpResponse::build(status).json(ErrorBody {
            error,
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<StorageError> for AdminError {
    fn from(err: StorageError) -> Self {
        AdminError::Internal(err.to_string())
    }
}

impl From<EnrichmentError> for AdminError {
    fn from(err: EnrichmentError) -> Self {
        match err {
            EnrichmentError::AttachmentNotFound(id) => {
                AdminError::NotFound(format!("attachment {}", id))
            }
            other => AdminError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for AdminError {
    fn from(err: TokenError) -> Self {
        AdminError::Internal(err.to_string())
    }
}
