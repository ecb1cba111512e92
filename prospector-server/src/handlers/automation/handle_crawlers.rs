use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use prospector_core::types::{CrawlerConfig, CrawlerConfigPatch, NewCrawlerConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CrawlerPath, crawler_id};
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
    middleware::TenantContext,
};

#[derive(Debug, Serialize)]
pub struct CrawlerListResponse {
    pub crawlers: Vec<CrawlerConfig>,
    pub count: usize,
}

/// Optional body of the toggle endpoint. Without it the flag is flipped.
#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DigestSentResponse {
    pub status: &'static str,
    pub recipients: usize,
}

pub async fn list_crawlers_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<CrawlerListResponse>> {
    let crawlers = state.registry.list(tenant.tenant_id).await?;
    Ok(Json(CrawlerListResponse {
        count: crawlers.len(),
        crawlers,
    }))
}

pub async fn create_crawler_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    body: Result<Json<NewCrawlerConfig>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CrawlerConfig>)> {
    let Json(new) = body?;
    let config = state
        .registry
        .create(tenant.tenant_id, tenant.user_id, new)
        .await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn get_crawler_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
) -> AppResult<Json<CrawlerConfig>> {
    let id = crawler_id(path)?;
    Ok(Json(state.registry.get(tenant.tenant_id, id).await?))
}

pub async fn update_crawler_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
    body: Result<Json<CrawlerConfigPatch>, JsonRejection>,
) -> AppResult<Json<CrawlerConfig>> {
    let id = crawler_id(path)?;
    let Json(patch) = body?;
    Ok(Json(state.registry.update(tenant.tenant_id, id, patch).await?))
}

pub async fn delete_crawler_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
) -> AppResult<StatusCode> {
    let id = crawler_id(path)?;
    state.registry.delete(tenant.tenant_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_crawler_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
    body: Bytes,
) -> AppResult<Json<CrawlerConfig>> {
    let id = crawler_id(path)?;
    let request = parse_toggle(&body)?;
    Ok(Json(
        state
            .registry
            .toggle(tenant.tenant_id, id, request.enabled)
            .await?,
    ))
}

fn parse_toggle(body: &[u8]) -> Result<ToggleRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ToggleRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("invalid toggle body: {err}")))
}

pub async fn send_test_digest_handler(
    State(state): State<AppState>,
    tenant: TenantContext,
    path: CrawlerPath,
) -> AppResult<Json<DigestSentResponse>> {
    let id = crawler_id(path)?;
    let digest = state.digest()?;
    let config = state.registry.get(tenant.tenant_id, id).await?;

    digest.send_test_digest(&config).await?;
    info!(config_id = %id, recipients = config.digest.recipients.len(), "test digest sent");
    Ok(Json(DigestSentResponse {
        status: "sent",
        recipients: config.digest.recipients.len(),
    }))
}
