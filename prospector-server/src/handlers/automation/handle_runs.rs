use std::convert::Infallible;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{Sse, sse::Event},
};
use prospector_core::types::{RunLog, RunLogPage};
use tokio_stream::Stream;
use tracing::info;

use super::{CrawlerPath, PageParams, crawler_id};
use crate::infra::{
    app_state::AppState,
    errors::AppResult,
    middleware::TenantContext,
    stream::{StreamSession, keep_alive, sse_events},
};

pub async fn list_runs_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
    query: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Json<RunLogPage>> {
    let id = crawler_id(path)?;
    let Query(params) = query?;
    Ok(Json(
        state
            .registry
            .runs(tenant.tenant_id, id, params.page_request())
            .await?,
    ))
}

/// Opens the live run stream: an `init` snapshot, then `run_*` events with
/// keep-alive comments in between.
///
/// Unknown crawlers are rejected with 404 before the stream opens.
pub async fn stream_runs_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
    query: Result<Query<PageParams>, QueryRejection>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id = crawler_id(path)?;
    let Query(params) = query?;
    state.registry.get(tenant.tenant_id, id).await?;

    let session = StreamSession::new(
        state.events.clone(),
        state.unit_of_work.runs.clone(),
        id,
        params.page_request(),
        state.shutdown.clone(),
    );

    Ok(Sse::new(sse_events(session.into_frames()))
        .keep_alive(keep_alive(state.config().stream.keep_alive)))
}

/// Runs the crawler once, synchronously, and returns the finished run.
///
/// The run executes on its own task, so it still completes and is counted
/// when the request times out or the client goes away.
pub async fn test_run_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
) -> AppResult<Json<RunLog>> {
    let id = crawler_id(path)?;
    let runner = state.runner()?;
    state.registry.get(tenant.tenant_id, id).await?;

    let lifecycle = state.lifecycle.clone();
    let completion =
        tokio::spawn(async move { lifecycle.execute_now(id, runner.as_ref()).await }).await??;
    info!(
        config_id = %id,
        run_id = %completion.run.id,
        proposals = completion.run.proposals_created,
        "test run finished"
    );
    Ok(Json(completion.run))
}
