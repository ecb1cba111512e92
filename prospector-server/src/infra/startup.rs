use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use prospector_core::lifecycle::RunLifecycle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::app_state::AppState;

#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn run(&self, state: &AppState) -> Result<()>;
}

/// Starts the background work a serving process needs.
#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn run(&self, state: &AppState) -> Result<()> {
        let lifecycle = &state.config().lifecycle;
        spawn_stale_run_reaper(
            state.lifecycle.clone(),
            lifecycle.stale_run_timeout,
            lifecycle.reaper_interval,
            state.shutdown.clone(),
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopStartupHooks;

#[async_trait]
impl StartupHooks for NoopStartupHooks {
    async fn run(&self, _state: &AppState) -> Result<()> {
        Ok(())
    }
}

/// Periodically fails runs stuck in `running`, until `shutdown` fires.
pub fn spawn_stale_run_reaper(
    lifecycle: Arc<RunLifecycle>,
    stale_after: Duration,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    info!(
        stale_after = %humantime::format_duration(stale_after),
        every = %humantime::format_duration(every),
        "stale run reaper started"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            match lifecycle.reap_stale_runs(stale_after).await {
                Ok(0) => debug!("no stale runs"),
                Ok(reaped) => warn!(reaped, "failed stale runs"),
                Err(err) => warn!(error = %err, "stale run sweep failed"),
            }
        }
        debug!("stale run reaper stopped");
    })
}
