use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    response::Json,
    routing::get,
};
use prospector_core::{database::ports::CrawlerConfigRepository, types::TenantId};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    AppState,
    infra::{
        config::CorsConfig,
        middleware::tenant::{TENANT_HEADER, USER_HEADER},
    },
    routes,
};

const DEFAULT_CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

pub fn create_app(state: AppState) -> Router {
    let versioned_api = routes::create_api_router(state.clone());

    // Build CORS layer (permissive in dev, allow-list in prod)
    let cors_layer = if state.config().dev_mode {
        CorsLayer::permissive()
    } else {
        cors_from_config(&state.config().cors)
    };

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .merge(versioned_api)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_from_config(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    let mut methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| match Method::from_bytes(m.as_bytes()) {
            Ok(method) => Some(method),
            Err(_) => {
                warn!(method = %m, "ignoring invalid CORS method");
                None
            }
        })
        .collect();

    let mut headers: Vec<HeaderName> = cors
        .allowed_headers
        .iter()
        .filter_map(|h| match HeaderName::from_bytes(h.as_bytes()) {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(header = %h, "ignoring invalid CORS header");
                None
            }
        })
        .collect();

    if methods.is_empty() {
        methods = DEFAULT_CORS_METHODS.to_vec();
    }
    if headers.is_empty() {
        headers = vec![
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(USER_HEADER),
        ];
    }

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::list(headers))
}

async fn ping_handler() -> Json<Value> {
    debug!("Ping endpoint called");
    Json(json!({
        "status": "ok",
        "message": "Prospector server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut health_status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let mut is_unhealthy = false;

    // Listing a tenant that cannot exist exercises the storage round trip.
    match state
        .unit_of_work
        .configs
        .list_configs(TenantId(Uuid::nil()))
        .await
    {
        Ok(_) => {
            health_status["checks"]["storage"] = json!({
                "status": "healthy",
                "backend": if state.config().database.url.is_some() { "postgres" } else { "memory" },
            });
        }
        Err(e) => {
            health_status["checks"]["storage"] = json!({
                "status": "unhealthy",
                "error": e.to_string()
            });
            is_unhealthy = true;
        }
    }

    health_status["checks"]["runner"] = json!({ "configured": state.runner.is_some() });
    health_status["checks"]["digest"] = json!({ "configured": state.digest.is_some() });
    health_status["checks"]["streams"] = json!({ "topics": state.events.topic_count() });

    if is_unhealthy {
        health_status["status"] = json!("unhealthy");
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    } else {
        Ok(Json(health_status))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use prospector_core::application::CrawlerUnitOfWork;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::infra::config::Config;

    fn app_with(config: Config) -> Router {
        create_app(AppState::new(
            CrawlerUnitOfWork::in_memory(),
            Arc::new(config),
            CancellationToken::new(),
        ))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/automation/crawlers")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", TENANT_HEADER)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn allow_listed_origin_passes_preflight() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec!["https://crm.example.com".into()];

        let response = app_with(config)
            .oneshot(preflight("https://crm.example.com"))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://crm.example.com"
        );
        let allowed_headers = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed_headers.contains(TENANT_HEADER));
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_headers() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec!["https://crm.example.com".into()];

        let response = app_with(config)
            .oneshot(preflight("https://evil.example.net"))
            .await
            .unwrap();

        assert!(
            !response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }

    #[tokio::test]
    async fn ping_needs_no_tenant() {
        let response = app_with(Config::default())
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
