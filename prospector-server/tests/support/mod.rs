#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum_test::{TestRequest, TestServer};
use prospector_core::{
    application::CrawlerUnitOfWork,
    providers::{DigestSender, Runner},
    types::{CrawlerConfig, TenantId, UserId},
};
use prospector_server::{
    AppState,
    app::create_app,
    infra::{
        config::Config,
        middleware::tenant::{TENANT_HEADER, USER_HEADER},
    },
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

pub const CRAWLERS: &str = "/api/v1/automation/crawlers";

/// A running router plus the handles tests poke at directly.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub tenant: Tenant,
}

#[derive(Debug, Clone, Copy)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl Tenant {
    pub fn random() -> Self {
        Self {
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
        }
    }
}

#[derive(Default)]
pub struct TestAppBuilder {
    unit_of_work: Option<CrawlerUnitOfWork>,
    runner: Option<Arc<dyn Runner>>,
    digest: Option<Arc<dyn DigestSender>>,
    shutdown: Option<CancellationToken>,
    config: Option<Config>,
}

impl TestAppBuilder {
    pub fn unit_of_work(mut self, uow: CrawlerUnitOfWork) -> Self {
        self.unit_of_work = Some(uow);
        self
    }

    pub fn runner(mut self, runner: impl Runner + 'static) -> Self {
        self.runner = Some(Arc::new(runner));
        self
    }

    pub fn digest(mut self, digest: impl DigestSender + 'static) -> Self {
        self.digest = Some(Arc::new(digest));
        self
    }

    /// Streams end as soon as this token is cancelled, which lets the mock
    /// transport collect a finite SSE body.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<TestApp> {
        let mut state = AppState::new(
            self.unit_of_work.unwrap_or_else(CrawlerUnitOfWork::in_memory),
            Arc::new(self.config.unwrap_or_default()),
            self.shutdown.unwrap_or_default(),
        );
        if let Some(runner) = self.runner {
            state = state.with_runner(runner);
        }
        if let Some(digest) = self.digest {
            state = state.with_digest(digest);
        }

        let server = TestServer::builder()
            .build(create_app(state.clone()))
            .map_err(|err| anyhow!(err.to_string()))?;

        Ok(TestApp {
            server,
            state,
            tenant: Tenant::random(),
        })
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.as_tenant(self.server.get(path), self.tenant)
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.as_tenant(self.server.post(path), self.tenant)
    }

    pub fn put(&self, path: &str) -> TestRequest {
        self.as_tenant(self.server.put(path), self.tenant)
    }

    pub fn delete(&self, path: &str) -> TestRequest {
        self.as_tenant(self.server.delete(path), self.tenant)
    }

    pub fn as_tenant(&self, request: TestRequest, tenant: Tenant) -> TestRequest {
        request
            .add_header(TENANT_HEADER, tenant.tenant_id.to_string())
            .add_header(USER_HEADER, tenant.user_id.to_string())
    }

    /// Creates a crawler through the API and returns the stored config.
    pub async fn create_crawler(&self, body: Value) -> Result<CrawlerConfig> {
        let response = self.post(CRAWLERS).json(&body).await;
        if response.status_code() != axum::http::StatusCode::CREATED {
            return Err(anyhow!(
                "create failed with {}: {}",
                response.status_code(),
                response.text()
            ));
        }
        Ok(response.json::<CrawlerConfig>())
    }
}

pub fn crawler_path(config: &CrawlerConfig) -> String {
    format!("{CRAWLERS}/{}", config.id)
}

pub fn crawler_body(name: &str) -> Value {
    json!({
        "name": name,
        "target_entity": "organization",
        "interval_seconds": 3600,
        "concurrent_searches": 2,
        "compilation_target": 3,
        "search": {
            "slots": [
                { "name": "vienna", "queries": ["architekturbuero wien"] }
            ]
        }
    })
}

/// Parses an SSE body into `(event, data)` pairs, skipping comments.
pub fn sse_frames(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(chunk) = line.strip_prefix("data:") {
                    data.push_str(chunk.trim_start());
                }
            }
            let event = event?;
            let data = serde_json::from_str(&data).unwrap_or(Value::Null);
            Some((event, data))
        })
        .collect()
}
