use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{
    ids::{CrawlerId, RunLogId},
    run_log::{RunLog, RunLogPage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlerEventType {
    Init,
    RunStarted,
    RunProgress,
    RunCompleted,
    Error,
}

impl CrawlerEventType {
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::RunStarted => "run_started",
            Self::RunProgress => "run_progress",
            Self::RunCompleted => "run_completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CrawlerEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCrawlerEventTypeError {
    invalid_value: String,
}

impl ParseCrawlerEventTypeError {
    pub fn new(value: &str) -> Self {
        Self {
            invalid_value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseCrawlerEventTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid crawler event type: {}", self.invalid_value)
    }
}

impl std::error::Error for ParseCrawlerEventTypeError {}

impl FromStr for CrawlerEventType {
    type Err = ParseCrawlerEventTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "init" => Ok(Self::Init),
            "run_started" => Ok(Self::RunStarted),
            "run_progress" => Ok(Self::RunProgress),
            "run_completed" => Ok(Self::RunCompleted),
            "error" => Ok(Self::Error),
            other => Err(ParseCrawlerEventTypeError::new(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStartedPayload {
    pub run: RunLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgressPayload {
    pub config_id: CrawlerId,
    pub run_id: RunLogId,
    pub message: String,
    #[serde(default)]
    pub leads_found: i32,
    #[serde(default)]
    pub proposals_created: i32,
}

/// Completion payload. The aggregate fields are only present when the run
/// changed what a UI shows for the crawler itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCompletedPayload {
    pub run: RunLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_active_proposals: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Everything that travels over a crawler topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CrawlerEvent {
    Init(RunLogPage),
    RunStarted(RunStartedPayload),
    RunProgress(RunProgressPayload),
    RunCompleted(RunCompletedPayload),
    Error(ErrorPayload),
}

impl CrawlerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub const fn event_type(&self) -> CrawlerEventType {
        match self {
            Self::Init(_) => CrawlerEventType::Init,
            Self::RunStarted(_) => CrawlerEventType::RunStarted,
            Self::RunProgress(_) => CrawlerEventType::RunProgress,
            Self::RunCompleted(_) => CrawlerEventType::RunCompleted,
            Self::Error(_) => CrawlerEventType::Error,
        }
    }

    /// JSON for the `data:` line of a stream frame (the payload only, the
    /// type travels in the `event:` line).
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Init(page) => serde_json::to_string(page),
            Self::RunStarted(payload) => serde_json::to_string(payload),
            Self::RunProgress(payload) => serde_json::to_string(payload),
            Self::RunCompleted(payload) => serde_json::to_string(payload),
            Self::Error(payload) => serde_json::to_string(payload),
        }
    }
}
