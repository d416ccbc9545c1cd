use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failure taxonomy. Failures are isolated at the smallest meaningful
/// unit: a bad request, one message, one mailbox, or one upstream call.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("IMAP connection failed: {0}")]
    Connection(String),
    #[error("message decode failed: {0}")]
    Decode(String),
    #[error("database error: {0}")]
    Persistence(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    NotFound(String),
    #[error("No active mailboxes found. Please connect a mailbox first.")]
    NoActiveMailboxes,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Connection(_) => StatusCode::BAD_GATEWAY,
            Self::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) | Self::NoActiveMailboxes => StatusCode::NOT_FOUND,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AppError::Validation("missing field".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NoActiveMailboxes.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Persistence("locked".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
