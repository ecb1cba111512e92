use thiserror::Error;

use crate::types::{CrawlerId, RunLogId, RunStatus};

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Invalid crawler configuration: {0}")]
    Validation(String),

    #[error("Crawler not found: {0}")]
    NotFound(CrawlerId),

    #[error("Run not found: {0}")]
    RunNotFound(RunLogId),

    #[error("Run {id} already completed with status {status}")]
    RunAlreadyCompleted { id: RunLogId, status: RunStatus },

    #[error("Run {run_id} failed: {message}")]
    ExecutionFailed { run_id: RunLogId, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrawlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for CrawlerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
