use chrono::{DateTime, Duration, Utc};

use crate::error::{CrawlerError, Result};
use crate::types::{
    CrawlerConfig, RunCompletedPayload, RunLog, RunOutcome,
};

/// Result of completing a run: the terminal run log, the crawler as stored
/// afterwards, and whether the crawler was switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCompletion {
    pub run: RunLog,
    pub config: CrawlerConfig,
    pub enabled_changed: bool,
}

impl RunCompletion {
    pub fn compiled(&self) -> bool {
        self.run.compiled
    }

    /// The aggregate fields ride along only when the compilation policy
    /// flipped the crawler off; otherwise the UI already has the right
    /// enabled state and refreshes counters from the run itself.
    pub fn event_payload(&self) -> RunCompletedPayload {
        let (config_active_proposals, config_enabled) = if self.enabled_changed {
            (Some(self.config.active_proposals), Some(self.config.enabled))
        } else {
            (None, None)
        };

        RunCompletedPayload {
            run: self.run.clone(),
            config_active_proposals,
            config_enabled,
        }
    }
}

/// Applies a terminal outcome to a running run log and its parent crawler.
///
/// Storage adapters call this inside their atomic section (a held lock or a
/// transaction with both rows locked) and persist both values afterwards.
pub fn finalize_run(
    mut config: CrawlerConfig,
    mut run: RunLog,
    outcome: &RunOutcome,
    completed_at: DateTime<Utc>,
) -> Result<RunCompletion> {
    if run.config_id != config.id {
        return Err(CrawlerError::Conflict(format!(
            "run {} belongs to crawler {}, not {}",
            run.id, run.config_id, config.id
        )));
    }
    if run.status.is_terminal() {
        return Err(CrawlerError::RunAlreadyCompleted {
            id: run.id,
            status: run.status,
        });
    }
    if !outcome.status.is_terminal() {
        return Err(CrawlerError::validation(
            "run outcome must be succeeded or failed",
        ));
    }
    if outcome.leads_found < 0
        || outcome.prospects_found < 0
        || outcome.proposals_created < 0
    {
        return Err(CrawlerError::validation(
            "run outcome counters cannot be negative",
        ));
    }

    run.completed_at = Some(completed_at);
    run.status = outcome.status;
    run.leads_found = outcome.leads_found;
    run.prospects_found = outcome.prospects_found;
    run.proposals_created = outcome.proposals_created;
    run.error_message = outcome.error_message.clone();
    if outcome.search_query.is_some() {
        run.search_query = outcome.search_query.clone();
    }

    config.run_count += 1;
    config.last_run_at = Some(completed_at);
    if config.enabled {
        config.next_run_at =
            Some(completed_at + Duration::seconds(config.interval_seconds));
    }

    config.active_proposals += i64::from(outcome.proposals_created);

    let was_enabled = config.enabled;
    if config.disable_on_compiled
        && config.enabled
        && config.active_proposals >= i64::from(config.compilation_target)
    {
        config.enabled = false;
        config.compiled_at = Some(completed_at);
        config.next_run_at = None;
        run.compiled = true;
    }

    config.updated_at = completed_at;

    Ok(RunCompletion {
        enabled_changed: config.enabled != was_enabled,
        run,
        config,
    })
}
