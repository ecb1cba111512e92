use axum::{
    Router,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;

use crate::{
    AppState,
    handlers::automation::{
        create_crawler_handler, delete_crawler_handler, get_crawler_handler,
        list_crawlers_handler, list_runs_handler, send_test_digest_handler,
        stream_runs_handler, test_run_handler, toggle_crawler_handler,
        update_crawler_handler,
    },
};

pub const CRAWLERS: &str = "/automation/crawlers";
pub const CRAWLER: &str = "/automation/crawlers/{id}";
pub const CRAWLER_RUNS: &str = "/automation/crawlers/{id}/runs";
pub const CRAWLER_RUNS_STREAM: &str = "/automation/crawlers/{id}/runs/stream";
pub const CRAWLER_TEST: &str = "/automation/crawlers/{id}/test";
pub const CRAWLER_TOGGLE: &str = "/automation/crawlers/{id}/toggle";
pub const CRAWLER_DIGEST_TEST: &str = "/automation/crawlers/{id}/digest/test";

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Long-lived; must not inherit the request deadline.
        .route(CRAWLER_RUNS_STREAM, get(stream_runs_handler))
        .merge(create_crawler_routes(state))
}

fn create_crawler_routes(state: AppState) -> Router<AppState> {
    let request_timeout = state.config().server.request_timeout;

    Router::new()
        .route(
            CRAWLERS,
            get(list_crawlers_handler).post(create_crawler_handler),
        )
        .route(
            CRAWLER,
            get(get_crawler_handler)
                .put(update_crawler_handler)
                .delete(delete_crawler_handler),
        )
        .route(CRAWLER_RUNS, get(list_runs_handler))
        .route(CRAWLER_TEST, post(test_run_handler))
        .route(CRAWLER_TOGGLE, post(toggle_crawler_handler))
        .route(CRAWLER_DIGEST_TEST, post(send_test_digest_handler))
        .layer(TimeoutLayer::new(request_timeout))
}
