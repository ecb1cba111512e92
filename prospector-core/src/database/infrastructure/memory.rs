use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::database::ports::{CrawlerConfigRepository, RunLogRepository};
use crate::error::{CrawlerError, Result};
use crate::lifecycle::{RunCompletion, finalize_run};
use crate::types::{
    CrawlerConfig, CrawlerConfigPatch, CrawlerId, PageRequest, RunLog,
    RunLogId, RunLogPage, RunOutcome, TenantId,
};

#[derive(Debug, Default)]
struct StoreState {
    configs: HashMap<CrawlerId, CrawlerConfig>,
    runs: HashMap<RunLogId, RunLog>,
}

/// Process-local store used when no database is configured and in tests.
///
/// A single lock covers configs and runs, so completion reads and writes
/// both rows without interleaving with other writers.
#[derive(Debug, Default)]
pub struct InMemoryCrawlerStore {
    state: Mutex<StoreState>,
}

impl InMemoryCrawlerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrawlerConfigRepository for InMemoryCrawlerStore {
    async fn insert_config(&self, config: &CrawlerConfig) -> Result<()> {
        let mut state = self.state.lock();
        if state.configs.contains_key(&config.id) {
            return Err(CrawlerError::Conflict(format!(
                "crawler {} already exists",
                config.id
            )));
        }
        state.configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn get_config(&self, id: CrawlerId) -> Result<Option<CrawlerConfig>> {
        Ok(self.state.lock().configs.get(&id).cloned())
    }

    async fn list_configs(&self, tenant: TenantId) -> Result<Vec<CrawlerConfig>> {
        let state = self.state.lock();
        let mut configs: Vec<CrawlerConfig> = state
            .configs
            .values()
            .filter(|config| config.tenant_id == tenant)
            .cloned()
            .collect();
        configs.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        Ok(configs)
    }

    async fn update_config(
        &self,
        id: CrawlerId,
        patch: CrawlerConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig> {
        let mut state = self.state.lock();
        let stored = state
            .configs
            .get_mut(&id)
            .ok_or(CrawlerError::NotFound(id))?;

        let mut updated = stored.clone();
        updated.apply_patch(patch, now);
        updated.validate()?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn set_enabled(
        &self,
        id: CrawlerId,
        enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig> {
        let mut state = self.state.lock();
        let stored = state
            .configs
            .get_mut(&id)
            .ok_or(CrawlerError::NotFound(id))?;

        let target = enabled.unwrap_or(!stored.enabled);
        stored.set_enabled(target, now);
        Ok(stored.clone())
    }

    async fn delete_config(&self, id: CrawlerId, cascade_runs: bool) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.configs.contains_key(&id) {
            return Ok(false);
        }

        let has_runs = state.runs.values().any(|run| run.config_id == id);
        if has_runs && !cascade_runs {
            return Err(CrawlerError::Conflict(format!(
                "crawler {id} still has run history"
            )));
        }

        state.runs.retain(|_, run| run.config_id != id);
        state.configs.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl RunLogRepository for InMemoryCrawlerStore {
    async fn insert_run(&self, run: &RunLog) -> Result<()> {
        let mut state = self.state.lock();
        if !state.configs.contains_key(&run.config_id) {
            return Err(CrawlerError::NotFound(run.config_id));
        }
        state.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunLogId) -> Result<Option<RunLog>> {
        Ok(self.state.lock().runs.get(&id).cloned())
    }

    async fn list_runs(&self, config_id: CrawlerId, page: PageRequest) -> Result<RunLogPage> {
        let state = self.state.lock();
        let mut runs: Vec<&RunLog> = state
            .runs
            .values()
            .filter(|run| run.config_id == config_id)
            .collect();
        runs.sort_by(|a, b| {
            b.started_at.cmp(&a.started_at).then_with(|| b.id.cmp(&a.id))
        });

        let total = runs.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let runs = runs
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(RunLogPage {
            runs,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn count_runs(&self, config_id: CrawlerId) -> Result<u64> {
        let state = self.state.lock();
        Ok(state
            .runs
            .values()
            .filter(|run| run.config_id == config_id)
            .count() as u64)
    }

    async fn complete_run(
        &self,
        id: RunLogId,
        outcome: &RunOutcome,
        completed_at: DateTime<Utc>,
    ) -> Result<RunCompletion> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get(&id)
            .cloned()
            .ok_or(CrawlerError::RunNotFound(id))?;
        let config = state
            .configs
            .get(&run.config_id)
            .cloned()
            .ok_or(CrawlerError::NotFound(run.config_id))?;

        let completion = finalize_run(config, run, outcome, completed_at)?;
        state.runs.insert(id, completion.run.clone());
        state
            .configs
            .insert(completion.config.id, completion.config.clone());
        Ok(completion)
    }

    async fn list_stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<RunLog>> {
        let state = self.state.lock();
        let mut stale: Vec<RunLog> = state
            .runs
            .values()
            .filter(|run| !run.status.is_terminal() && run.started_at < started_before)
            .cloned()
            .collect();
        stale.sort_by_key(|run| run.started_at);
        Ok(stale)
    }
}
