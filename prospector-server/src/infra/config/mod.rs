pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigWarning, ConfigWarnings,
};
pub use models::{
    Config, ConfigMetadata, CorsConfig, CrawlersConfig, DatabaseConfig,
    LifecycleConfig, RemoteServiceConfig, ServerConfig, StreamConfig,
};
