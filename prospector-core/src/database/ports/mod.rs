//! Repository ports for crawler configuration and run history.
//! Adapters live under `database::infrastructure`.

pub mod crawlers;
pub mod run_logs;

pub use crawlers::CrawlerConfigRepository;
pub use run_logs::RunLogRepository;
