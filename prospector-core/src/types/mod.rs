// Crawler domain types shared by the core services and the HTTP layer

pub mod crawler;
pub mod events;
pub mod ids;
pub mod run_log;

pub use crawler::*;
pub use events::*;
pub use ids::*;
pub use run_log::*;
