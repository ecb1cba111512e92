use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::lifecycle::RunCompletion;
use crate::types::{CrawlerId, PageRequest, RunLog, RunLogId, RunLogPage, RunOutcome};

#[async_trait]
pub trait RunLogRepository: Send + Sync {
    /// Fails with `NotFound` when the parent crawler does not exist.
    async fn insert_run(&self, run: &RunLog) -> Result<()>;

    async fn get_run(&self, id: RunLogId) -> Result<Option<RunLog>>;

    /// Newest first.
    async fn list_runs(&self, config_id: CrawlerId, page: PageRequest) -> Result<RunLogPage>;

    async fn count_runs(&self, config_id: CrawlerId) -> Result<u64>;

    /// Finalizes a running run and updates its crawler's aggregates as one
    /// atomic unit.
    async fn complete_run(
        &self,
        id: RunLogId,
        outcome: &RunOutcome,
        completed_at: DateTime<Utc>,
    ) -> Result<RunCompletion>;

    /// Runs still `running` that started before `started_before`.
    async fn list_stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<RunLog>>;
}
