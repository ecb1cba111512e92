use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::CrawlerError;
use crate::types::{
    AgentSettings, CrawlerConfig, DigestSettings, RunLog, RunStatus,
    SearchParameters, TargetEntity,
};

pub(super) const CONFIG_COLUMNS: &str = "id, tenant_id, owner_id, name, target_entity, enabled, \
     interval_seconds, concurrent_searches, compilation_target, disable_on_compiled, \
     active_proposals, compiled_at, run_count, last_run_at, next_run_at, \
     search, digest, agent, created_at, updated_at";

pub(super) const RUN_COLUMNS: &str = "id, config_id, started_at, completed_at, status, \
     leads_found, prospects_found, proposals_created, error_message, search_query, compiled";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CrawlerRow {
    id: Uuid,
    tenant_id: Uuid,
    owner_id: Uuid,
    name: String,
    target_entity: String,
    enabled: bool,
    interval_seconds: i64,
    concurrent_searches: i32,
    compilation_target: i32,
    disable_on_compiled: bool,
    active_proposals: i64,
    compiled_at: Option<DateTime<Utc>>,
    run_count: i64,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    search: Json<SearchParameters>,
    digest: Json<DigestSettings>,
    agent: Json<AgentSettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CrawlerRow> for CrawlerConfig {
    type Error = CrawlerError;

    fn try_from(row: CrawlerRow) -> Result<Self, Self::Error> {
        let target_entity = TargetEntity::parse(&row.target_entity).ok_or_else(|| {
            CrawlerError::storage(format!(
                "crawler {} has unknown target entity '{}'",
                row.id, row.target_entity
            ))
        })?;

        Ok(Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            owner_id: row.owner_id.into(),
            name: row.name,
            target_entity,
            enabled: row.enabled,
            interval_seconds: row.interval_seconds,
            concurrent_searches: row.concurrent_searches,
            compilation_target: row.compilation_target,
            disable_on_compiled: row.disable_on_compiled,
            active_proposals: row.active_proposals,
            compiled_at: row.compiled_at,
            run_count: row.run_count,
            last_run_at: row.last_run_at,
            next_run_at: row.next_run_at,
            search: row.search.0,
            digest: row.digest.0,
            agent: row.agent.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct RunRow {
    id: Uuid,
    config_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    leads_found: i32,
    prospects_found: i32,
    proposals_created: i32,
    error_message: Option<String>,
    search_query: Option<String>,
    compiled: bool,
}

impl TryFrom<RunRow> for RunLog {
    type Error = CrawlerError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status = RunStatus::parse(&row.status).ok_or_else(|| {
            CrawlerError::storage(format!(
                "run {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id.into(),
            config_id: row.config_id.into(),
            started_at: row.started_at,
            completed_at: row.completed_at,
            status,
            leads_found: row.leads_found,
            prospects_found: row.prospects_found,
            proposals_created: row.proposals_created,
            error_message: row.error_message,
            search_query: row.search_query,
            compiled: row.compiled,
        })
    }
}
