//! # Prospector Core
//!
//! Core library behind the Prospector automation crawlers: tenant-owned
//! crawler configurations that periodically search for leads, the run
//! history they produce, and the live event feed browsers follow while runs
//! are in flight.
//!
//! ## Overview
//!
//! - **Event bus**: [`event_bus::CrawlerEventBus`] fans events for one
//!   crawler out to every connected stream without letting a slow consumer
//!   hold up the publisher
//! - **Run lifecycle**: [`lifecycle::RunLifecycle`] records runs, applies
//!   completion bookkeeping atomically and disables crawlers that reached
//!   their compilation target
//! - **Registry**: [`registry::CrawlerRegistry`] validates and stores
//!   crawler configurations per tenant
//! - **Storage**: repository ports with in-memory and PostgreSQL adapters
//! - **Providers**: the runner and digest capabilities plus HTTP adapters
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL adapter and migrations (SQLx)
//! - `postgres-tests`: enables the PostgreSQL-backed integration tests
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use prospector_core::{
//!     application::CrawlerUnitOfWork,
//!     event_bus::CrawlerEventBus,
//!     lifecycle::{LifecycleSettings, RunLifecycle},
//!     types::{CrawlerId, RunOutcome, RunReport},
//! };
//!
//! async fn record_run(config_id: CrawlerId) -> prospector_core::Result<()> {
//!     let uow = CrawlerUnitOfWork::in_memory();
//!     let bus = Arc::new(CrawlerEventBus::default());
//!     let lifecycle = RunLifecycle::new(
//!         uow.configs.clone(),
//!         uow.runs.clone(),
//!         bus,
//!         LifecycleSettings::default(),
//!     );
//!
//!     let run = lifecycle.start(config_id).await?;
//!     lifecycle
//!         .complete(run.id, RunOutcome::succeeded(RunReport::default()))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod database;
pub mod error;
pub mod event_bus;
pub mod lifecycle;
pub mod providers;
pub mod registry;
pub mod types;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use error::{CrawlerError, Result};
