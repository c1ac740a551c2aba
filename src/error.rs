use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// The cached similarity table was not built from the cached matrix.
    #[error("{0}")]
    StaleSnapshot(String),

    /// An external call exceeded its deadline; the caller may retry.
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Server(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Name reported in the `error` field of the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "DataNotExistError",
            AppError::Validation(_) => "ValidationError",
            AppError::Unauthorized(_) => "UnauthorizedAccessError",
            AppError::Forbidden(_) => "DoNotHaveAccessError",
            AppError::StaleSnapshot(_) => "StaleSnapshotError",
            AppError::Timeout(_) => "ServiceTimeoutError",
            AppError::Server(_) => "ServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_)
            | AppError::Validation(_)
            | AppError::StaleSnapshot(_)
            | AppError::Server(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY && matches!(self, AppError::Server(_)) {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Server(format!("Serialization error: {}", e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Server(format!("I/O error: {}", e))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Server(format!("Database error: {}", e))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Server(format!("Cache error: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(format!("External service timed out: {}", e))
        } else {
            AppError::Server(format!("External service error: {}", e))
        }
    }
}
