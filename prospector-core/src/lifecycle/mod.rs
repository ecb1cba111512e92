//! Run state machine: `running -> succeeded | failed`.
//!
//! Starting a run records a run log and announces it on the crawler's topic.
//! Completing it finalizes the run log and the crawler aggregates in one
//! atomic store call, then announces the result.

mod completion;

pub use completion::{RunCompletion, finalize_run};

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::database::ports::{CrawlerConfigRepository, RunLogRepository};
use crate::error::{CrawlerError, Result};
use crate::event_bus::CrawlerEventBus;
use crate::providers::{ProgressReporter, RunContext, Runner};
use crate::types::{
    CrawlerConfig, CrawlerEvent, CrawlerId, RunLog, RunLogId, RunOutcome,
    RunProgressPayload, RunStartedPayload,
};

pub const DEFAULT_COMPLETION_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Total tries for the completion write, first one included.
    pub completion_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            completion_attempts: DEFAULT_COMPLETION_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

pub struct RunLifecycle {
    configs: Arc<dyn CrawlerConfigRepository>,
    runs: Arc<dyn RunLogRepository>,
    bus: Arc<CrawlerEventBus>,
    settings: LifecycleSettings,
}

impl std::fmt::Debug for RunLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLifecycle")
            .field("bus", &self.bus)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RunLifecycle {
    pub fn new(
        configs: Arc<dyn CrawlerConfigRepository>,
        runs: Arc<dyn RunLogRepository>,
        bus: Arc<CrawlerEventBus>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            configs,
            runs,
            bus,
            settings,
        }
    }

    pub fn bus(&self) -> &Arc<CrawlerEventBus> {
        &self.bus
    }

    /// Records a new running run for the crawler and publishes `run_started`.
    #[instrument(skip_all, fields(config_id = %config_id), err)]
    pub async fn start(&self, config_id: CrawlerId) -> Result<RunLog> {
        let (_, run) = self.begin(config_id).await?;
        Ok(run)
    }

    async fn begin(&self, config_id: CrawlerId) -> Result<(CrawlerConfig, RunLog)> {
        let config = self
            .configs
            .get_config(config_id)
            .await?
            .ok_or(CrawlerError::NotFound(config_id))?;

        let run = RunLog::started(config_id, Utc::now());
        self.runs.insert_run(&run).await?;

        let delivered = self.bus.publish(
            &config_id.topic(),
            CrawlerEvent::RunStarted(RunStartedPayload { run: run.clone() }),
        );
        info!(run_id = %run.id, delivered, "crawler run started");
        Ok((config, run))
    }

    pub fn progress_reporter(&self, run: &RunLog) -> ProgressReporter {
        ProgressReporter::new(Arc::clone(&self.bus), run.config_id, run.id)
    }

    /// Publishes `run_progress`. Nothing is stored.
    pub fn report_progress(&self, progress: RunProgressPayload) -> usize {
        let topic = progress.config_id.topic();
        self.bus.publish(&topic, CrawlerEvent::RunProgress(progress))
    }

    /// Finalizes a running run and publishes `run_completed`.
    ///
    /// Storage errors are retried with exponential backoff; every other
    /// error, including completing a run that is already terminal, is
    /// returned right away without touching anything.
    #[instrument(skip_all, fields(run_id = %run_id, status = %outcome.status), err)]
    pub async fn complete(&self, run_id: RunLogId, outcome: RunOutcome) -> Result<RunCompletion> {
        let attempts = self.settings.completion_attempts.max(1);
        let mut backoff = self.settings.retry_backoff;
        let mut attempt = 1;

        let completion = loop {
            match self.runs.complete_run(run_id, &outcome, Utc::now()).await {
                Ok(completion) => break completion,
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %err, "run completion failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let delivered = self.bus.publish(
            &completion.config.id.topic(),
            CrawlerEvent::RunCompleted(completion.event_payload()),
        );
        info!(
            config_id = %completion.config.id,
            proposals_created = completion.run.proposals_created,
            active_proposals = completion.config.active_proposals,
            delivered,
            "crawler run completed"
        );
        if completion.compiled() {
            info!(
                config_id = %completion.config.id,
                compilation_target = completion.config.compilation_target,
                "crawler reached its compilation target and was disabled"
            );
        }

        Ok(completion)
    }

    /// Runs the crawler once, synchronously: start, execute, complete.
    ///
    /// A runner failure, or a report with negative counters, is still
    /// recorded as a failed run before `ExecutionFailed` is returned.
    #[instrument(skip_all, fields(config_id = %config_id))]
    pub async fn execute_now(&self, config_id: CrawlerId, runner: &dyn Runner) -> Result<RunCompletion> {
        let (config, run) = self.begin(config_id).await?;
        let ctx = RunContext {
            config,
            run_id: run.id,
            progress: self.progress_reporter(&run),
        };

        let (message, partial) = match runner.execute(ctx).await {
            Ok(report) if report.has_negative_counters() => {
                ("runner reported negative counters".to_string(), None)
            }
            Ok(report) => return self.complete(run.id, RunOutcome::succeeded(report)).await,
            Err(failure) => (
                failure.to_string(),
                failure
                    .partial()
                    .filter(|partial| !partial.has_negative_counters())
                    .cloned(),
            ),
        };

        warn!(run_id = %run.id, error = %message, "crawler run failed");
        self.complete(run.id, RunOutcome::failed(message.clone(), partial))
            .await?;
        Err(CrawlerError::ExecutionFailed {
            run_id: run.id,
            message,
        })
    }

    /// Fails every run that has been `running` for longer than `timeout`.
    /// Returns how many runs were closed.
    pub async fn reap_stale_runs(&self, timeout: Duration) -> Result<usize> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|err| CrawlerError::validation(format!("stale run timeout out of range: {err}")))?;
        let cutoff = Utc::now() - timeout;
        let stale = self.runs.list_stale_runs(cutoff).await?;

        let mut reaped = 0;
        for run in stale {
            let message = format!(
                "run did not complete within {} seconds",
                timeout.num_seconds()
            );
            match self.complete(run.id, RunOutcome::failed(message, None)).await {
                Ok(_) => {
                    warn!(run_id = %run.id, config_id = %run.config_id, "stale crawler run marked failed");
                    reaped += 1;
                }
                // Finished by its runner between listing and completion.
                Err(CrawlerError::RunAlreadyCompleted { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(reaped)
    }
}
