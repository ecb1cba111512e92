use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations are `humantime` strings such as `"10s"` or `"1h 30m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub runner: Option<FileRemoteConfig>,
    pub digest: Option<FileRemoteConfig>,
    #[serde(default)]
    pub stream: FileStreamConfig,
    #[serde(default)]
    pub lifecycle: FileLifecycleConfig,
    #[serde(default)]
    pub crawlers: FileCrawlersConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRemoteConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_capacity: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLifecycleConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_run_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaper_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCrawlersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_delete_runs: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<Vec<String>>,
}

/// Environment-derived configuration values.
///
/// Values are kept raw where parsing can fail so the loader can name the
/// offending variable.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub request_timeout: Option<String>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub runner_url: Option<String>,
    pub runner_timeout: Option<String>,
    pub digest_url: Option<String>,
    pub digest_timeout: Option<String>,
    pub stream_keep_alive: Option<String>,
    pub stream_subscriber_capacity: Option<usize>,
    pub completion_attempts: Option<u32>,
    pub retry_backoff: Option<String>,
    pub stale_run_timeout: Option<String>,
    pub reaper_interval: Option<String>,
    pub cascade_delete_runs: Option<bool>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allowed_methods: Option<Vec<String>>,
    pub cors_allowed_headers: Option<Vec<String>>,
    pub dev_mode: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            std::env::var("PROSPECTOR_CONFIG_PATH").ok().map(PathBuf::from);

        env_config.server_host = std::env::var("SERVER_HOST").ok();
        env_config.server_port = parse_var("SERVER_PORT");
        env_config.request_timeout = std::env::var("REQUEST_TIMEOUT").ok();

        env_config.database_url = std::env::var("DATABASE_URL").ok();
        env_config.database_max_connections =
            parse_var("DATABASE_MAX_CONNECTIONS");

        env_config.runner_url = std::env::var("RUNNER_URL").ok();
        env_config.runner_timeout = std::env::var("RUNNER_TIMEOUT").ok();
        env_config.digest_url = std::env::var("DIGEST_URL").ok();
        env_config.digest_timeout = std::env::var("DIGEST_TIMEOUT").ok();

        env_config.stream_keep_alive = std::env::var("STREAM_KEEP_ALIVE").ok();
        env_config.stream_subscriber_capacity =
            parse_var("STREAM_SUBSCRIBER_CAPACITY");

        env_config.completion_attempts = parse_var("RUN_COMPLETION_ATTEMPTS");
        env_config.retry_backoff = std::env::var("RUN_RETRY_BACKOFF").ok();
        env_config.stale_run_timeout = std::env::var("STALE_RUN_TIMEOUT").ok();
        env_config.reaper_interval = std::env::var("REAPER_INTERVAL").ok();

        env_config.cascade_delete_runs =
            parse_bool_var("CRAWLER_CASCADE_DELETE_RUNS");

        env_config.cors_allowed_origins = parse_csv_var("CORS_ALLOWED_ORIGINS");
        env_config.cors_allowed_methods = parse_csv_var("CORS_ALLOWED_METHODS");
        env_config.cors_allowed_headers = parse_csv_var("CORS_ALLOWED_HEADERS");

        env_config.dev_mode = parse_bool_var("DEV_MODE");

        env_config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .filter_map(|part| {
                let trimmed = part.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    })
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}
