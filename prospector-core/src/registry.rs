use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::database::ports::{CrawlerConfigRepository, RunLogRepository};
use crate::error::{CrawlerError, Result};
use crate::types::{
    CrawlerConfig, CrawlerConfigPatch, CrawlerId, NewCrawlerConfig, PageRequest,
    RunLogPage, TenantId, UserId,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Delete crawlers together with their run history instead of refusing.
    pub cascade_delete_runs: bool,
}

/// Tenant-scoped CRUD over crawler configurations.
///
/// Crawlers of other tenants are indistinguishable from missing ones.
pub struct CrawlerRegistry {
    configs: Arc<dyn CrawlerConfigRepository>,
    runs: Arc<dyn RunLogRepository>,
    settings: RegistrySettings,
}

impl std::fmt::Debug for CrawlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerRegistry")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CrawlerRegistry {
    pub fn new(
        configs: Arc<dyn CrawlerConfigRepository>,
        runs: Arc<dyn RunLogRepository>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            configs,
            runs,
            settings,
        }
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub async fn create(
        &self,
        tenant: TenantId,
        owner: UserId,
        new: NewCrawlerConfig,
    ) -> Result<CrawlerConfig> {
        new.validate()?;
        let config = CrawlerConfig::from_new(tenant, owner, new, Utc::now());
        self.configs.insert_config(&config).await?;
        info!(config_id = %config.id, "crawler created");
        Ok(config)
    }

    pub async fn get(&self, tenant: TenantId, id: CrawlerId) -> Result<CrawlerConfig> {
        match self.configs.get_config(id).await? {
            Some(config) if config.tenant_id == tenant => Ok(config),
            _ => Err(CrawlerError::NotFound(id)),
        }
    }

    pub async fn list(&self, tenant: TenantId) -> Result<Vec<CrawlerConfig>> {
        self.configs.list_configs(tenant).await
    }

    #[instrument(skip(self, patch), err)]
    pub async fn update(
        &self,
        tenant: TenantId,
        id: CrawlerId,
        patch: CrawlerConfigPatch,
    ) -> Result<CrawlerConfig> {
        self.get(tenant, id).await?;
        let config = self.configs.update_config(id, patch, Utc::now()).await?;
        info!("crawler updated");
        Ok(config)
    }

    /// Sets `enabled`, or flips it when no target is given.
    #[instrument(skip(self), err)]
    pub async fn toggle(
        &self,
        tenant: TenantId,
        id: CrawlerId,
        enabled: Option<bool>,
    ) -> Result<CrawlerConfig> {
        self.get(tenant, id).await?;
        let config = self.configs.set_enabled(id, enabled, Utc::now()).await?;
        info!(enabled = config.enabled, "crawler toggled");
        Ok(config)
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, tenant: TenantId, id: CrawlerId) -> Result<()> {
        self.get(tenant, id).await?;
        if !self
            .configs
            .delete_config(id, self.settings.cascade_delete_runs)
            .await?
        {
            return Err(CrawlerError::NotFound(id));
        }
        info!("crawler deleted");
        Ok(())
    }

    /// Run history for one of the tenant's crawlers, newest first.
    pub async fn runs(
        &self,
        tenant: TenantId,
        id: CrawlerId,
        page: PageRequest,
    ) -> Result<RunLogPage> {
        self.get(tenant, id).await?;
        self.runs.list_runs(id, page).await
    }
}
