//! PostgreSQL adapter for the crawler ports.
//!
//! Every read-modify-write runs in a transaction that locks the rows it
//! touches with `SELECT ... FOR UPDATE`, run row before crawler row.

mod rows;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions, types::Json};
use tracing::info;

use crate::database::ports::{CrawlerConfigRepository, RunLogRepository};
use crate::error::{CrawlerError, Result};
use crate::lifecycle::{RunCompletion, finalize_run};
use crate::types::{
    CrawlerConfig, CrawlerConfigPatch, CrawlerId, PageRequest, RunLog,
    RunLogId, RunLogPage, RunOutcome, TenantId,
};

use rows::{CONFIG_COLUMNS, CrawlerRow, RUN_COLUMNS, RunRow};

#[derive(Clone, Debug)]
pub struct PostgresCrawlerStore {
    pool: PgPool,
}

impl PostgresCrawlerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| {
                CrawlerError::storage(format!("Database connection failed: {e}"))
            })?;
        info!(max_connections, "crawler database pool initialized");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| CrawlerError::storage(format!("Migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_config(
        tx: &mut Transaction<'_, Postgres>,
        id: CrawlerId,
    ) -> Result<CrawlerConfig> {
        let row = sqlx::query_as::<_, CrawlerRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM crawler_configs WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(CrawlerError::NotFound(id))?;
        row.try_into()
    }
}

#[async_trait]
impl CrawlerConfigRepository for PostgresCrawlerStore {
    async fn insert_config(&self, config: &CrawlerConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawler_configs (
                id, tenant_id, owner_id, name, target_entity, enabled,
                interval_seconds, concurrent_searches, compilation_target,
                disable_on_compiled, active_proposals, compiled_at, run_count,
                last_run_at, next_run_at, search, digest, agent,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(config.id)
        .bind(config.tenant_id)
        .bind(config.owner_id)
        .bind(&config.name)
        .bind(config.target_entity.as_str())
        .bind(config.enabled)
        .bind(config.interval_seconds)
        .bind(config.concurrent_searches)
        .bind(config.compilation_target)
        .bind(config.disable_on_compiled)
        .bind(config.active_proposals)
        .bind(config.compiled_at)
        .bind(config.run_count)
        .bind(config.last_run_at)
        .bind(config.next_run_at)
        .bind(Json(&config.search))
        .bind(Json(&config.digest))
        .bind(Json(&config.agent))
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_config(&self, id: CrawlerId) -> Result<Option<CrawlerConfig>> {
        sqlx::query_as::<_, CrawlerRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM crawler_configs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(CrawlerConfig::try_from)
        .transpose()
    }

    async fn list_configs(&self, tenant: TenantId) -> Result<Vec<CrawlerConfig>> {
        sqlx::query_as::<_, CrawlerRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM crawler_configs \
             WHERE tenant_id = $1 ORDER BY created_at, id"
        ))
        .bind(tenant)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CrawlerConfig::try_from)
        .collect()
    }

    async fn update_config(
        &self,
        id: CrawlerId,
        patch: CrawlerConfigPatch,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig> {
        let mut tx = self.pool.begin().await?;
        let mut config = Self::lock_config(&mut tx, id).await?;
        config.apply_patch(patch, now);
        config.validate()?;

        sqlx::query(
            r#"
            UPDATE crawler_configs
            SET name = $2,
                target_entity = $3,
                interval_seconds = $4,
                concurrent_searches = $5,
                compilation_target = $6,
                disable_on_compiled = $7,
                search = $8,
                digest = $9,
                agent = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&config.name)
        .bind(config.target_entity.as_str())
        .bind(config.interval_seconds)
        .bind(config.concurrent_searches)
        .bind(config.compilation_target)
        .bind(config.disable_on_compiled)
        .bind(Json(&config.search))
        .bind(Json(&config.digest))
        .bind(Json(&config.agent))
        .bind(config.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(config)
    }

    async fn set_enabled(
        &self,
        id: CrawlerId,
        enabled: Option<bool>,
        now: DateTime<Utc>,
    ) -> Result<CrawlerConfig> {
        let mut tx = self.pool.begin().await?;
        let mut config = Self::lock_config(&mut tx, id).await?;
        let target = enabled.unwrap_or(!config.enabled);
        config.set_enabled(target, now);

        sqlx::query(
            "UPDATE crawler_configs SET enabled = $2, next_run_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(config.enabled)
        .bind(config.next_run_at)
        .bind(config.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(config)
    }

    async fn delete_config(&self, id: CrawlerId, cascade_runs: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query_scalar::<_, CrawlerId>(
            "SELECT id FROM crawler_configs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
        if !exists {
            return Ok(false);
        }

        let runs: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM crawler_run_logs WHERE config_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if runs > 0 && !cascade_runs {
            return Err(CrawlerError::Conflict(format!(
                "crawler {id} still has run history"
            )));
        }

        sqlx::query("DELETE FROM crawler_run_logs WHERE config_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM crawler_configs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl RunLogRepository for PostgresCrawlerStore {
    async fn insert_run(&self, run: &RunLog) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO crawler_run_logs (
                id, config_id, started_at, completed_at, status, leads_found,
                prospects_found, proposals_created, error_message,
                search_query, compiled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(run.id)
        .bind(run.config_id)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.status.as_str())
        .bind(run.leads_found)
        .bind(run.prospects_found)
        .bind(run.proposals_created)
        .bind(&run.error_message)
        .bind(&run.search_query)
        .bind(run.compiled)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(db_err) = e.as_database_error()
                    && db_err.is_foreign_key_violation()
                {
                    return Err(CrawlerError::NotFound(run.config_id));
                }
                Err(e.into())
            }
        }
    }

    async fn get_run(&self, id: RunLogId) -> Result<Option<RunLog>> {
        sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM crawler_run_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(RunLog::try_from)
        .transpose()
    }

    async fn list_runs(&self, config_id: CrawlerId, page: PageRequest) -> Result<RunLogPage> {
        let total = self.count_runs(config_id).await?;
        let runs = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM crawler_run_logs \
             WHERE config_id = $1 \
             ORDER BY started_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(config_id)
        .bind(i64::from(page.limit))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(RunLog::try_from)
        .collect::<Result<Vec<_>>>()?;

        Ok(RunLogPage {
            runs,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn count_runs(&self, config_id: CrawlerId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM crawler_run_logs WHERE config_id = $1",
        )
        .bind(config_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn complete_run(
        &self,
        id: RunLogId,
        outcome: &RunOutcome,
        completed_at: DateTime<Utc>,
    ) -> Result<RunCompletion> {
        let mut tx = self.pool.begin().await?;

        let run: RunLog = sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM crawler_run_logs WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CrawlerError::RunNotFound(id))?
        .try_into()?;
        let config = Self::lock_config(&mut tx, run.config_id).await?;

        // Rejections leave the transaction uncommitted, so nothing changes.
        let completion = finalize_run(config, run, outcome, completed_at)?;

        let run = &completion.run;
        sqlx::query(
            r#"
            UPDATE crawler_run_logs
            SET completed_at = $2,
                status = $3,
                leads_found = $4,
                prospects_found = $5,
                proposals_created = $6,
                error_message = $7,
                search_query = $8,
                compiled = $9
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.completed_at)
        .bind(run.status.as_str())
        .bind(run.leads_found)
        .bind(run.prospects_found)
        .bind(run.proposals_created)
        .bind(&run.error_message)
        .bind(&run.search_query)
        .bind(run.compiled)
        .execute(&mut *tx)
        .await?;

        let config = &completion.config;
        sqlx::query(
            r#"
            UPDATE crawler_configs
            SET enabled = $2,
                active_proposals = $3,
                compiled_at = $4,
                run_count = $5,
                last_run_at = $6,
                next_run_at = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(config.id)
        .bind(config.enabled)
        .bind(config.active_proposals)
        .bind(config.compiled_at)
        .bind(config.run_count)
        .bind(config.last_run_at)
        .bind(config.next_run_at)
        .bind(config.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(completion)
    }

    async fn list_stale_runs(&self, started_before: DateTime<Utc>) -> Result<Vec<RunLog>> {
        sqlx::query_as::<_, RunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM crawler_run_logs \
             WHERE status = 'running' AND started_at < $1 \
             ORDER BY started_at"
        ))
        .bind(started_before)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(RunLog::try_from)
        .collect()
    }
}
