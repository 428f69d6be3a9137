use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Image host error: {0}")]
    ImageHost(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => AppError::NotFound { entity, id },
            StorageError::UsernameTaken(name) => AppError::UsernameTaken(name),
            StorageError::Validation(msg) => AppError::Validation(msg),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UsernameTaken(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) | AppError::ImageHost(_) => StatusCode::BAD_GATEWAY,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal errors are collapsed outside dev mode so
    /// stack-level detail never leaves the process.
    fn public_message(&self, dev: bool) -> String {
        match self {
            AppError::Io(_) | AppError::Internal(_) | AppError::Upstream(_) if !dev => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = uuid::Uuid::new_v4().to_string();
        let status = self.status_code();
        let dev = crate::config::dev_mode();

        if status.is_server_error() {
            log::error!("[{}] {}", error_id, self);
        } else {
            log::warn!("[{}] {}", error_id, self);
        }

        let body = json!({
            "success": false,
            "message": self.public_message(dev),
            "errorId": error_id,
        });

        (status, Json(body)).into_response()
    }
}
