//! # Prospector Server
//!
//! HTTP surface for automation crawlers: CRUD over crawler configurations,
//! run history, synchronous test runs and a server-sent-events stream that
//! follows a crawler's runs live.
//!
//! The binary in `main.rs` loads [`infra::config::Config`], wires an
//! [`AppState`] over PostgreSQL or in-memory storage and serves
//! [`app::create_app`].

pub mod app;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
