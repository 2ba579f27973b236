use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Everything a handler can fail with, mapped onto the HTTP surface in one
/// place. Storage and join failures stay opaque to clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 400
    #[error("{0}")]
    Validation(String),

    #[error("email is already in use")]
    DuplicateEmail,

    // 401
    #[error("email or password is incorrect")]
    InvalidCredentials,

    #[error("a valid access token is required")]
    Unauthenticated,

    // 403
    #[error("access denied")]
    Forbidden,

    // 404
    #[error("{0} not found")]
    NotFound(&'static str),

    // 500
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Sqlx(_) | ApiError::TaskJoin(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
