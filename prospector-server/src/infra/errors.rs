use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use prospector_core::{CrawlerError, providers::DigestError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<CrawlerError> for AppError {
    fn from(err: CrawlerError) -> Self {
        match err {
            CrawlerError::Validation(msg) => Self::bad_request(msg),
            CrawlerError::NotFound(_) | CrawlerError::RunNotFound(_) => {
                Self::not_found(err.to_string())
            }
            CrawlerError::RunAlreadyCompleted { .. } | CrawlerError::Conflict(_) => {
                Self::conflict(err.to_string())
            }
            CrawlerError::ExecutionFailed { run_id, message } => {
                tracing::warn!(%run_id, %message, "crawler run failed");
                Self::internal(message)
            }
            CrawlerError::Storage(_) | CrawlerError::Serialization(_) => {
                tracing::error!(error = %err, "crawler storage operation failed");
                Self::internal("Database operation failed")
            }
        }
    }
}

impl From<DigestError> for AppError {
    fn from(err: DigestError) -> Self {
        match err {
            DigestError::NoRecipients => Self::bad_request(err.to_string()),
            DigestError::Rejected { .. } | DigestError::Network(_) => {
                tracing::warn!(error = %err, "test digest failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "background task did not finish");
        Self::internal("Background task failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_core::types::{CrawlerId, RunLogId, RunStatus};

    #[test]
    fn crawler_errors_map_to_statuses() {
        let cases = [
            (CrawlerError::validation("bad"), StatusCode::BAD_REQUEST),
            (CrawlerError::NotFound(CrawlerId::new()), StatusCode::NOT_FOUND),
            (CrawlerError::RunNotFound(RunLogId::new()), StatusCode::NOT_FOUND),
            (
                CrawlerError::RunAlreadyCompleted {
                    id: RunLogId::new(),
                    status: RunStatus::Failed,
                },
                StatusCode::CONFLICT,
            ),
            (CrawlerError::Conflict("runs".into()), StatusCode::CONFLICT),
            (
                CrawlerError::ExecutionFailed {
                    run_id: RunLogId::new(),
                    message: "search provider down".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CrawlerError::storage("pool timed out"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn storage_details_stay_out_of_the_response() {
        let err = AppError::from(CrawlerError::storage("password authentication failed"));
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn execution_failures_carry_the_runner_message() {
        let err = AppError::from(CrawlerError::ExecutionFailed {
            run_id: RunLogId::new(),
            message: "search provider returned 429".into(),
        });
        assert_eq!(err.message, "search provider returned 429");
    }
}
