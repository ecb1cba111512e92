use std::{fmt, sync::Arc};

use prospector_core::{
    application::CrawlerUnitOfWork,
    event_bus::CrawlerEventBus,
    lifecycle::RunLifecycle,
    providers::{DigestSender, Runner},
    registry::CrawlerRegistry,
};
use tokio_util::sync::CancellationToken;

use crate::infra::{config::Config, errors::AppError};

/// Shared handles every request handler works with.
#[derive(Clone)]
pub struct AppState {
    pub unit_of_work: Arc<CrawlerUnitOfWork>,
    pub registry: Arc<CrawlerRegistry>,
    pub lifecycle: Arc<RunLifecycle>,
    pub events: Arc<CrawlerEventBus>,
    pub runner: Option<Arc<dyn Runner>>,
    pub digest: Option<Arc<dyn DigestSender>>,
    pub config: Arc<Config>,
    /// Cancelled once the server starts shutting down; open streams end.
    pub shutdown: CancellationToken,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("runner", &self.runner.is_some())
            .field("digest", &self.digest.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires registry, lifecycle and event bus over one unit of work.
    pub fn new(
        unit_of_work: CrawlerUnitOfWork,
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Self {
        let events = Arc::new(CrawlerEventBus::new(
            config.stream.subscriber_capacity,
        ));
        let registry = Arc::new(CrawlerRegistry::new(
            unit_of_work.configs.clone(),
            unit_of_work.runs.clone(),
            config.registry_settings(),
        ));
        let lifecycle = Arc::new(RunLifecycle::new(
            unit_of_work.configs.clone(),
            unit_of_work.runs.clone(),
            events.clone(),
            config.lifecycle_settings(),
        ));

        Self {
            unit_of_work: Arc::new(unit_of_work),
            registry,
            lifecycle,
            events,
            runner: None,
            digest: None,
            config,
            shutdown,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_digest(mut self, digest: Arc<dyn DigestSender>) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Owned so a test run can outlive the request that started it.
    pub fn runner(&self) -> Result<Arc<dyn Runner>, AppError> {
        self.runner
            .clone()
            .ok_or_else(|| AppError::unavailable("Crawler runner is not configured"))
    }

    pub fn digest(&self) -> Result<&dyn DigestSender, AppError> {
        self.digest
            .as_deref()
            .ok_or_else(|| AppError::unavailable("Digest sender is not configured"))
    }
}
