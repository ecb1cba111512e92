#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use prospector_core::{
    application::CrawlerUnitOfWork,
    event_bus::CrawlerEventBus,
    lifecycle::{LifecycleSettings, RunLifecycle},
    registry::{CrawlerRegistry, RegistrySettings},
    types::{
        NewCrawlerConfig, SearchParameters, SearchSlot, TargetEntity, TenantId,
        UserId,
    },
};

pub struct Harness {
    pub uow: CrawlerUnitOfWork,
    pub bus: Arc<CrawlerEventBus>,
    pub lifecycle: RunLifecycle,
    pub registry: CrawlerRegistry,
    pub tenant: TenantId,
    pub owner: UserId,
}

pub fn harness() -> Harness {
    harness_with(CrawlerUnitOfWork::in_memory(), RegistrySettings::default())
}

pub fn harness_with(uow: CrawlerUnitOfWork, registry: RegistrySettings) -> Harness {
    let bus = Arc::new(CrawlerEventBus::new(16));
    let lifecycle = RunLifecycle::new(
        uow.configs.clone(),
        uow.runs.clone(),
        Arc::clone(&bus),
        LifecycleSettings {
            completion_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        },
    );
    let registry = CrawlerRegistry::new(uow.configs.clone(), uow.runs.clone(), registry);

    Harness {
        uow,
        bus,
        lifecycle,
        registry,
        tenant: TenantId::new(),
        owner: UserId::new(),
    }
}

pub fn new_crawler(compilation_target: i32, disable_on_compiled: bool) -> NewCrawlerConfig {
    NewCrawlerConfig {
        name: "Architecture firms".into(),
        target_entity: TargetEntity::Organization,
        enabled: true,
        interval_seconds: 3600,
        concurrent_searches: 2,
        compilation_target,
        disable_on_compiled,
        search: SearchParameters {
            slots: vec![SearchSlot {
                name: "vienna".into(),
                queries: vec!["architekturbuero wien".into()],
                enabled: true,
            }],
            ..Default::default()
        },
        digest: Default::default(),
        agent: Default::default(),
    }
}
