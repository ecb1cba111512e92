//! Automation crawler endpoints.

pub mod handle_crawlers;
pub mod handle_runs;

use axum::extract::{Path, rejection::PathRejection};
use prospector_core::types::{CrawlerId, PageRequest};
use serde::Deserialize;

use crate::infra::errors::AppError;

pub use handle_crawlers::{
    create_crawler_handler, delete_crawler_handler, get_crawler_handler,
    list_crawlers_handler, send_test_digest_handler, toggle_crawler_handler,
    update_crawler_handler,
};
pub use handle_runs::{list_runs_handler, stream_runs_handler, test_run_handler};

pub(crate) type CrawlerPath = Result<Path<CrawlerId>, PathRejection>;

pub(crate) fn crawler_id(path: CrawlerPath) -> Result<CrawlerId, AppError> {
    let Path(id) = path?;
    Ok(id)
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn page_request(self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}
