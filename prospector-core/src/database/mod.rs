pub mod infrastructure;
pub mod ports;

pub use infrastructure::memory::InMemoryCrawlerStore;
#[cfg(feature = "database")]
pub use infrastructure::postgres::PostgresCrawlerStore;
