use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ids::{CrawlerId, RunLogId};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLog {
    pub id: RunLogId,
    pub config_id: CrawlerId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub leads_found: i32,
    pub prospects_found: i32,
    pub proposals_created: i32,
    pub error_message: Option<String>,
    pub search_query: Option<String>,
    pub compiled: bool,
}

impl RunLog {
    pub fn started(config_id: CrawlerId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: RunLogId::new(),
            config_id,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            leads_found: 0,
            prospects_found: 0,
            proposals_created: 0,
            error_message: None,
            search_query: None,
            compiled: false,
        }
    }
}

/// Counters a runner reports for a finished (or partially finished) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub leads_found: i32,
    #[serde(default)]
    pub prospects_found: i32,
    #[serde(default)]
    pub proposals_created: i32,
    #[serde(default)]
    pub search_query: Option<String>,
}

impl RunReport {
    /// Counters come from remote runners and cannot be stored when negative.
    pub fn has_negative_counters(&self) -> bool {
        self.leads_found < 0 || self.prospects_found < 0 || self.proposals_created < 0
    }
}

/// Terminal result handed to `RunLifecycle::complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    #[serde(default)]
    pub leads_found: i32,
    #[serde(default)]
    pub prospects_found: i32,
    #[serde(default)]
    pub proposals_created: i32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(report: RunReport) -> Self {
        Self {
            status: RunStatus::Succeeded,
            leads_found: report.leads_found,
            prospects_found: report.prospects_found,
            proposals_created: report.proposals_created,
            error_message: None,
            search_query: report.search_query,
        }
    }

    /// A failed outcome. Counters default to zero unless the runner got far
    /// enough to report partial work.
    pub fn failed(message: impl Into<String>, partial: Option<RunReport>) -> Self {
        let partial = partial.unwrap_or_default();
        Self {
            status: RunStatus::Failed,
            leads_found: partial.leads_found,
            prospects_found: partial.prospects_found,
            proposals_created: partial.proposals_created,
            error_message: Some(message.into()),
            search_query: partial.search_query,
        }
    }
}

/// 1-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogPage {
    pub runs: Vec<RunLog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
