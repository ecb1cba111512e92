use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use crate::event_bus::CrawlerEventBus;
use crate::types::{
    CrawlerConfig, CrawlerEvent, CrawlerId, RunLogId, RunProgressPayload, RunReport,
};

#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("{message}")]
    Failed {
        message: String,
        partial: Option<RunReport>,
    },

    #[error("Runner rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Runner unreachable: {0}")]
    Network(#[from] reqwest::Error),
}

impl RunFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(message: impl Into<String>, partial: RunReport) -> Self {
        Self::Failed {
            message: message.into(),
            partial: Some(partial),
        }
    }

    /// Counters the runner managed to report before failing.
    pub fn partial(&self) -> Option<&RunReport> {
        match self {
            Self::Failed { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }
}

/// Publishes `run_progress` events for one run. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    bus: Arc<CrawlerEventBus>,
    config_id: CrawlerId,
    run_id: RunLogId,
}

impl ProgressReporter {
    pub fn new(bus: Arc<CrawlerEventBus>, config_id: CrawlerId, run_id: RunLogId) -> Self {
        Self {
            bus,
            config_id,
            run_id,
        }
    }

    pub fn report(&self, message: impl Into<String>, leads_found: i32, proposals_created: i32) {
        let payload = RunProgressPayload {
            config_id: self.config_id,
            run_id: self.run_id,
            message: message.into(),
            leads_found,
            proposals_created,
        };
        let delivered = self
            .bus
            .publish(&self.config_id.topic(), CrawlerEvent::RunProgress(payload));
        trace!(run_id = %self.run_id, delivered, "run progress published");
    }
}

/// Everything a runner gets to work on a single run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: CrawlerConfig,
    pub run_id: RunLogId,
    pub progress: ProgressReporter,
}

/// Performs the search-and-propose work of one run.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn execute(&self, ctx: RunContext) -> Result<RunReport, RunFailure>;
}
