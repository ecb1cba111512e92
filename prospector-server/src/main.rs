//! # Prospector Server
//!
//! Serves the automation crawler API.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for crawler configurations and run history (in memory when
//!   no database is configured)
//! - An in-process event bus feeding the live run streams
//! - Remote runner and digest services reached over HTTP

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use prospector_core::{
    application::CrawlerUnitOfWork,
    providers::{HttpDigestSender, HttpRunner},
};
use prospector_server::{
    AppState,
    app::create_app,
    infra::{
        config::{
            Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions,
            RemoteServiceConfig,
        },
        startup::{ProdStartupHooks, StartupHooks},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "prospector-server")]
#[command(about = "Automation crawler API with live run streams")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Path to a prospector.toml file
    #[arg(long, env = "PROSPECTOR_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        return run_db_migrate(&cli.serve).await;
    }

    run_server(cli.serve, &ProdStartupHooks).await
}

#[cfg(feature = "postgres")]
async fn run_db_migrate(args: &ServeArgs) -> anyhow::Result<()> {
    let config = load_runtime_config(args)?;
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is required to run migrations")?;
    let store = prospector_core::database::PostgresCrawlerStore::connect(
        url,
        config.database.max_connections,
    )
    .await
    .context("failed to connect to PostgreSQL for migration")?;
    store.migrate().await.context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn run_db_migrate(_args: &ServeArgs) -> anyhow::Result<()> {
    anyhow::bail!("built without the `postgres` feature; nothing to migrate")
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<Arc<Config>> {
    let loader = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
    });
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    apply_cli_overrides(&mut config, args);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,prospector_core=info,prospector_server=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    Ok(Arc::new(config))
}

fn apply_cli_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
}

async fn wire_app_resources(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> anyhow::Result<AppState> {
    let unit_of_work = connect_storage(&config).await?;
    let mut state = AppState::new(unit_of_work, Arc::clone(&config), shutdown);

    if let Some(runner) = config.runner.as_ref() {
        info!(url = %runner.url, "crawler runner configured");
        state = state.with_runner(Arc::new(HttpRunner::new(
            http_client(runner)?,
            runner.url.clone(),
        )));
    }
    if let Some(digest) = config.digest.as_ref() {
        info!(url = %digest.url, "digest sender configured");
        state = state.with_digest(Arc::new(HttpDigestSender::new(
            http_client(digest)?,
            digest.url.clone(),
        )));
    }

    Ok(state)
}

async fn connect_storage(config: &Config) -> anyhow::Result<CrawlerUnitOfWork> {
    match config.database.url.as_deref() {
        Some(url) => connect_postgres(url, config.database.max_connections).await,
        None => {
            info!("using in-memory crawler storage");
            Ok(CrawlerUnitOfWork::in_memory())
        }
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
    url: &str,
    max_connections: u32,
) -> anyhow::Result<CrawlerUnitOfWork> {
    let store = prospector_core::database::PostgresCrawlerStore::connect(
        url,
        max_connections,
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    store
        .migrate()
        .await
        .context("failed to apply database migrations")?;
    info!("using PostgreSQL crawler storage");
    Ok(CrawlerUnitOfWork::postgres(store))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
    _url: &str,
    _max_connections: u32,
) -> anyhow::Result<CrawlerUnitOfWork> {
    anyhow::bail!("DATABASE_URL is set but the server was built without the `postgres` feature")
}

fn http_client(service: &RemoteServiceConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(service.timeout)
        .build()
        .context("failed to build HTTP client")
}

async fn run_server<H>(args: ServeArgs, hooks: &H) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let config = load_runtime_config(&args)?;
    let shutdown = CancellationToken::new();

    let state = wire_app_resources(Arc::clone(&config), shutdown.clone()).await?;
    hooks.run(&state).await?;

    let router = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting Prospector server on {}", addr);

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let graceful = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await
        .context("server error")?;

    info!("Prospector server stopped");
    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM, which also ends every open stream.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::{Config, ServeArgs, apply_cli_overrides};

    #[test]
    fn cli_overrides_win_over_config() {
        let mut config = Config::default();
        config.server.port = 3000;

        let args = ServeArgs {
            port: Some(8443),
            host: Some("127.0.0.1".into()),
            ..Default::default()
        };
        apply_cli_overrides(&mut config, &args);

        assert_eq!(config.server.port, 8443);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn missing_overrides_keep_config() {
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &ServeArgs::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
