use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{CrawlerConfig, CrawlerConfigPatch, CrawlerId, TenantId};

#[async_trait]
pub trait CrawlerConfigRepository: Send + Sync {
    async fn insert_config(&self, config: &CrawlerConfig) -> Result<()>;

    async fn get_config(&self, id: CrawlerId) -> Result<Option<CrawlerConfig>>;

    /// Crawlers owned by `tenant`, oldest first.
    async fn list_configs(&self, tenant: TenantId) -> Result<Vec<CrawlerConfig>>;

    /// Applies the user-editable fields of `patch` and validates the result
    /// before anything is written. Aggregates and the enabled flag are never
    /// touched here.
    async fn update_config(
        &self,
        id: CrawlerId,
        patch: CrawlerConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig>;

    /// Sets the enabled flag, or flips it when `enabled` is `None`.
    async fn set_enabled(
        &self,
        id: CrawlerId,
        enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig>;

    /// Deletes the crawler. With `cascade_runs` unset the delete is refused
    /// while run logs exist. Returns `false` when nothing was deleted.
    async fn delete_config(&self, id: CrawlerId, cascade_runs: bool) -> Result<bool>;
}
