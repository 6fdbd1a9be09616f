//! # HTTP Server Assembly
//!
//! Builds the smart router from configuration, registers the provider
//! fleet, starts the health monitor and wires the axum routes:
//!
//! - `POST /v1/chat/completions` — unary and SSE streaming completions
//! - `GET /v1/models` — models reachable through the fleet
//! - `GET /health`, `GET /metrics` — liveness and router metrics
//! - `GET /admin/providers` — per-provider status (breaker, health, load)
//! - `PUT /admin/providers/{name}/weight` — live weight changes
//! - `POST /admin/providers/{name}/breaker/reset` — manual breaker reset
//! - `GET /admin/config`, `PUT /admin/config` — view and swap settings
//!
//! Middleware: CORS (when enabled), request tracing, and a whole-request
//! timeout from `server.timeout`.

use crate::config::Config;
use crate::handlers;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use switchboard_router::provider::create_provider;
use switchboard_router::router::SmartRouter;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub router: Arc<SmartRouter>,
}

/// Build the router, register providers, start health monitoring and
/// return the ready-to-serve axum application.
pub async fn create_server(config: Config) -> anyhow::Result<Router> {
    let router = SmartRouter::new(config.router.clone())
        .map_err(|e| anyhow::anyhow!("router construction failed: {e}"))?;
    let router = Arc::new(router);

    for (name, provider_config) in &config.providers {
        let mut provider_config = provider_config.clone();
        // The registry key is authoritative for the instance name.
        provider_config.name = name.clone();
        if !provider_config.enabled {
            tracing::info!(provider = %name, "skipping disabled provider");
            continue;
        }
        let provider = create_provider(provider_config)
            .map_err(|e| anyhow::anyhow!("provider {name} failed to build: {e}"))?;
        router
            .add_provider(Arc::from(provider))
            .await
            .map_err(|e| anyhow::anyhow!("provider {name} failed to register: {e}"))?;
    }

    if config.providers.is_empty() {
        tracing::warn!("no providers configured; every request will return NO_PROVIDER");
    }

    router.start().await;

    let state = AppState {
        config: Arc::new(config.clone()),
        router,
    };

    let mut cors = CorsLayer::new();
    if config.server.cors.enabled {
        cors = if config.server.cors.allowed_origins.iter().any(|o| o == "*") {
            tracing::warn!(
                "CORS allows any origin; configure allowed_origins for production deployments"
            );
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .server
                .cors
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        };
    }

    let app = Router::new()
        // OpenAI-compatible surface
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/models", get(handlers::list_models))
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Administration
        .route("/admin/providers", get(handlers::list_providers))
        .route(
            "/admin/providers/{name}/weight",
            put(handlers::update_provider_weight),
        )
        .route(
            "/admin/providers/{name}/breaker/reset",
            post(handlers::reset_breaker),
        )
        .route(
            "/admin/config",
            get(handlers::get_config).put(handlers::update_router_config),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.server.timeout))
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}
