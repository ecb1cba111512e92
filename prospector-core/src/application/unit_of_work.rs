use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::database::infrastructure::memory::InMemoryCrawlerStore;
#[cfg(feature = "database")]
use crate::database::infrastructure::postgres::PostgresCrawlerStore;
use crate::database::ports::{CrawlerConfigRepository, RunLogRepository};

/// The repository ports the crawler services work against.
///
/// Both handles usually point at the same store so that run completion and
/// crawler edits share one source of truth.
#[derive(Clone)]
pub struct CrawlerUnitOfWork {
    pub configs: Arc<dyn CrawlerConfigRepository>,
    pub runs: Arc<dyn RunLogRepository>,
}

impl fmt::Debug for CrawlerUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerUnitOfWork")
            .field("configs", &type_name_of_val(self.configs.as_ref()))
            .field("runs", &type_name_of_val(self.runs.as_ref()))
            .finish()
    }
}

impl CrawlerUnitOfWork {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CrawlerConfigRepository + RunLogRepository + 'static,
    {
        Self {
            configs: store.clone(),
            runs: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryCrawlerStore::new()))
    }

    #[cfg(feature = "database")]
    pub fn postgres(store: PostgresCrawlerStore) -> Self {
        Self::from_store(Arc::new(store))
    }
}
