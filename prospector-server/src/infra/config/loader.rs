use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use super::{
    models::{
        Config, ConfigMetadata, CorsConfig, CrawlersConfig, DEFAULT_HOST,
        DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_REMOTE_TIMEOUT,
        DatabaseConfig, LifecycleConfig, RemoteServiceConfig, ServerConfig,
        StreamConfig,
    },
    sources::{EnvConfig, FileConfig, FileRemoteConfig},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("prospector.toml"),
        PathBuf::from("config/prospector.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Resolves [`Config`] from environment variables, an optional TOML file and
/// built-in defaults, in that order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] but with an explicit environment and
    /// without reading a `.env` file.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path)?;
        validate(&config)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No prospector.toml detected; falling back to environment variables",
            "Set PROSPECTOR_CONFIG_PATH or add config/prospector.toml",
        );
    }

    let FileConfig {
        server: file_server,
        database: file_database,
        runner: file_runner,
        digest: file_digest,
        stream: file_stream,
        lifecycle: file_lifecycle,
        crawlers: file_crawlers,
        cors: file_cors,
        dev_mode: file_dev_mode,
    } = file_config.unwrap_or_default();

    let defaults_server = ServerConfig::default();
    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        request_timeout: duration_setting(
            "request_timeout",
            env.request_timeout.or(file_server.request_timeout),
            defaults_server.request_timeout,
        )?,
    };

    let database = DatabaseConfig {
        url: env.database_url.or(file_database.url),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };
    if database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not set; crawlers and run history are kept in memory",
            "Point DATABASE_URL at PostgreSQL to persist them",
        );
    }

    let runner = remote_service(
        "runner",
        env.runner_url,
        env.runner_timeout,
        file_runner,
    )?;
    if runner.is_none() {
        warnings.push_with_hint(
            "No crawler runner configured; test runs will be rejected",
            "Set RUNNER_URL or [runner].url",
        );
    }
    let digest = remote_service(
        "digest",
        env.digest_url,
        env.digest_timeout,
        file_digest,
    )?;

    let defaults_stream = StreamConfig::default();
    let stream = StreamConfig {
        keep_alive: duration_setting(
            "stream.keep_alive",
            env.stream_keep_alive.or(file_stream.keep_alive),
            defaults_stream.keep_alive,
        )?,
        subscriber_capacity: env
            .stream_subscriber_capacity
            .or(file_stream.subscriber_capacity)
            .unwrap_or(defaults_stream.subscriber_capacity),
    };

    let defaults_lifecycle = LifecycleConfig::default();
    let lifecycle = LifecycleConfig {
        completion_attempts: env
            .completion_attempts
            .or(file_lifecycle.completion_attempts)
            .unwrap_or(defaults_lifecycle.completion_attempts),
        retry_backoff: duration_setting(
            "lifecycle.retry_backoff",
            env.retry_backoff.or(file_lifecycle.retry_backoff),
            defaults_lifecycle.retry_backoff,
        )?,
        stale_run_timeout: duration_setting(
            "lifecycle.stale_run_timeout",
            env.stale_run_timeout.or(file_lifecycle.stale_run_timeout),
            defaults_lifecycle.stale_run_timeout,
        )?,
        reaper_interval: duration_setting(
            "lifecycle.reaper_interval",
            env.reaper_interval.or(file_lifecycle.reaper_interval),
            defaults_lifecycle.reaper_interval,
        )?,
    };

    let crawlers = CrawlersConfig {
        cascade_delete_runs: env
            .cascade_delete_runs
            .or(file_crawlers.cascade_delete_runs)
            .unwrap_or(false),
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .or(file_cors.allowed_origins)
            .unwrap_or_else(default_cors_origins),
        allowed_methods: env
            .cors_allowed_methods
            .or(file_cors.allowed_methods)
            .unwrap_or_else(default_cors_methods),
        allowed_headers: env
            .cors_allowed_headers
            .or(file_cors.allowed_headers)
            .unwrap_or_else(default_cors_headers),
    };

    let dev_mode = env.dev_mode.or(file_dev_mode).unwrap_or(false);

    let config = Config {
        server,
        database,
        runner,
        digest,
        stream,
        lifecycle,
        crawlers,
        cors,
        dev_mode,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    Ok((config, warnings))
}

fn remote_service(
    name: &'static str,
    env_url: Option<String>,
    env_timeout: Option<String>,
    file: Option<FileRemoteConfig>,
) -> Result<Option<RemoteServiceConfig>, ConfigLoadError> {
    let (file_url, file_timeout) = match file {
        Some(file) => (Some(file.url), file.timeout),
        None => (None, None),
    };
    let Some(raw_url) = env_url.or(file_url) else {
        return Ok(None);
    };

    let url = Url::parse(raw_url.trim()).map_err(|source| {
        ConfigLoadError::InvalidUrl {
            key: name,
            source,
        }
    })?;
    let timeout = duration_setting(
        name,
        env_timeout.or(file_timeout),
        DEFAULT_REMOTE_TIMEOUT,
    )?;

    Ok(Some(RemoteServiceConfig { url, timeout }))
}

fn duration_setting(
    key: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                key,
                value: raw,
                source,
            }
        }),
        None => Ok(default),
    }
}

fn validate(config: &Config) -> Result<(), ConfigLoadError> {
    if config.stream.keep_alive.is_zero() {
        return Err(ConfigLoadError::Invalid(
            "stream.keep_alive must be greater than zero".into(),
        ));
    }
    if config.stream.subscriber_capacity == 0 {
        return Err(ConfigLoadError::Invalid(
            "stream.subscriber_capacity must be greater than zero".into(),
        ));
    }
    if config.lifecycle.completion_attempts == 0 {
        return Err(ConfigLoadError::Invalid(
            "lifecycle.completion_attempts must be at least 1".into(),
        ));
    }
    if config.server.request_timeout.is_zero() {
        return Err(ConfigLoadError::Invalid(
            "server.request_timeout must be greater than zero".into(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigLoadError::Invalid(
            "database.max_connections must be at least 1".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {key} URL")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid duration '{value}' for {key}")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_cors_methods() -> Vec<String> {
    vec![
        "GET".to_string(),
        "POST".to_string(),
        "PUT".to_string(),
        "DELETE".to_string(),
        "OPTIONS".to_string(),
    ]
}

fn default_cors_headers() -> Vec<String> {
    vec![
        "Content-Type".to_string(),
        "Last-Event-ID".to_string(),
        "X-Tenant-Id".to_string(),
        "X-User-Id".to_string(),
    ]
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp config");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_apply_without_sources() {
        let load = ConfigLoader::new()
            .with_config_path(PathBuf::from("/nonexistent/never.toml"))
            .load_with_env(EnvConfig::default());
        assert!(matches!(load, Err(ConfigLoadError::MissingConfig { .. })));

        let (config, warnings) =
            compose_config(None, EnvConfig::default(), None).expect("config");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.stream.keep_alive, Duration::from_secs(10));
        assert_eq!(config.stream.subscriber_capacity, 64);
        assert_eq!(config.lifecycle.completion_attempts, 3);
        assert!(config.runner.is_none());
        assert!(!config.crawlers.cascade_delete_runs);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn file_values_are_read_and_env_wins() {
        let file = write_config(
            r#"
            dev_mode = true

            [server]
            port = 8080
            request_timeout = "45s"

            [runner]
            url = "http://runner.internal:9000/"
            timeout = "2m"

            [stream]
            keep_alive = "15s"
            subscriber_capacity = 8

            [lifecycle]
            stale_run_timeout = "30m"

            [crawlers]
            cascade_delete_runs = true
            "#,
        );

        let env = EnvConfig {
            server_port: Some(9090),
            ..Default::default()
        };
        let load = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env)
            .expect("config loads");
        let config = load.config;

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.request_timeout, Duration::from_secs(45));
        let runner = config.runner.expect("runner configured");
        assert_eq!(runner.url.as_str(), "http://runner.internal:9000/");
        assert_eq!(runner.timeout, Duration::from_secs(120));
        assert_eq!(config.stream.keep_alive, Duration::from_secs(15));
        assert_eq!(config.stream.subscriber_capacity, 8);
        assert_eq!(
            config.lifecycle.stale_run_timeout,
            Duration::from_secs(30 * 60)
        );
        assert!(config.crawlers.cascade_delete_runs);
        assert!(config.dev_mode);
        assert_eq!(config.metadata.config_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn zero_keep_alive_is_rejected() {
        let env = EnvConfig {
            stream_keep_alive: Some("0s".into()),
            ..Default::default()
        };
        let file = write_config("");
        let result = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env);
        assert!(matches!(result, Err(ConfigLoadError::Invalid(_))));
    }

    #[test]
    fn zero_queue_capacity_and_attempts_are_rejected() {
        let file = write_config(
            r#"
            [stream]
            subscriber_capacity = 0
            "#,
        );
        let result = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(EnvConfig::default());
        assert!(matches!(result, Err(ConfigLoadError::Invalid(_))));

        let env = EnvConfig {
            completion_attempts: Some(0),
            ..Default::default()
        };
        let file = write_config("");
        let result = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env);
        assert!(matches!(result, Err(ConfigLoadError::Invalid(_))));
    }

    #[test]
    fn malformed_duration_names_the_setting() {
        let env = EnvConfig {
            reaper_interval: Some("every now and then".into()),
            ..Default::default()
        };
        let file = write_config("");
        let err = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env)
            .expect_err("bad duration");
        match err {
            ConfigLoadError::InvalidDuration { key, .. } => {
                assert_eq!(key, "lifecycle.reaper_interval")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_runner_url_is_rejected() {
        let env = EnvConfig {
            runner_url: Some("not a url".into()),
            ..Default::default()
        };
        let file = write_config("");
        let result = ConfigLoader::new()
            .with_config_path(file.path())
            .load_with_env(env);
        assert!(matches!(
            result,
            Err(ConfigLoadError::InvalidUrl { key: "runner", .. })
        ));
    }
}
