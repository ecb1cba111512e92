use std::{path::PathBuf, time::Duration};

use prospector_core::{
    event_bus::DEFAULT_SUBSCRIBER_CAPACITY,
    lifecycle::{DEFAULT_COMPLETION_ATTEMPTS, DEFAULT_RETRY_BACKOFF, LifecycleSettings},
    registry::RegistrySettings,
};
use url::Url;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);
pub const DEFAULT_STALE_RUN_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Remote crawler runner. Test runs answer 503 when absent.
    pub runner: Option<RemoteServiceConfig>,
    /// Remote digest mailer. Test digests answer 503 when absent.
    pub digest: Option<RemoteServiceConfig>,
    pub stream: StreamConfig,
    pub lifecycle: LifecycleConfig,
    pub crawlers: CrawlersConfig,
    pub cors: CorsConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            completion_attempts: self.lifecycle.completion_attempts,
            retry_backoff: self.lifecycle.retry_backoff,
        }
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            cascade_delete_runs: self.crawlers.cascade_delete_runs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for every route except the run stream.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; crawlers live in memory when unset.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServiceConfig {
    pub url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub keep_alive: Duration,
    /// Events buffered per connected stream before new ones are dropped.
    pub subscriber_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub completion_attempts: u32,
    pub retry_backoff: Duration,
    /// Runs still `running` after this long are failed by the reaper.
    pub stale_run_timeout: Duration,
    pub reaper_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            completion_attempts: DEFAULT_COMPLETION_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            stale_run_timeout: DEFAULT_STALE_RUN_TIMEOUT,
            reaper_interval: DEFAULT_REAPER_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlersConfig {
    pub cascade_delete_runs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

/// Where the configuration came from, for startup logging.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
