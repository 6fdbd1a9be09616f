//! # Switchboard Gateway
//!
//! OpenAI-compatible HTTP front-end over the [`switchboard_router`] core.
//! One surface, many upstreams: requests arrive at
//! `POST /v1/chat/completions`, the smart router picks a healthy provider
//! under the configured load-balancing strategy, and responses — unary or
//! server-sent-event streams — come back in the OpenAI wire shape whoever
//! actually served them.
//!
//! ## Modules
//!
//! - **`config`** — TOML configuration with env overrides
//! - **`server`** — axum application assembly and middleware
//! - **`handlers`** — completion, models, health, metrics and admin routes
//! - **`gateway_error`** — router error → HTTP status mapping
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchboard_gateway::{config::Config, server::create_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml")?;
//!     config.validate()?;
//!     let app = create_server(config).await?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod gateway_error;
pub mod handlers;
pub mod server;

pub use server::create_server;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::time::Duration;
    use switchboard_router::provider::ProviderConfig;

    fn test_config() -> Config {
        let mut config = Config::default();
        // Keep the probe loop effectively idle during tests.
        config.router.health_check_interval = Duration::from_secs(3600);
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig::new("openai", "openai", "test-key")
                .with_base_url("http://127.0.0.1:1")
                .with_timeout(Duration::from_secs(1))
                .with_model_mapping("gpt-4o", "gpt-4o"),
        );
        config
    }

    #[tokio::test]
    async fn health_check_reports_fleet_size() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"], 1);
        assert!(body["timestamp"].is_string());
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_snapshot() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/metrics").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["requests_total"], 0);
        assert!(body["selections_by_provider"].is_object());
    }

    #[tokio::test]
    async fn list_providers_exposes_breaker_and_health() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/admin/providers").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        let providers = body["providers"].as_array().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0]["name"], "openai");
        assert_eq!(providers[0]["breaker"]["state"], "closed");
        assert_eq!(providers[0]["health"]["is_healthy"], true);
        assert_eq!(providers[0]["active_connections"], 0);
    }

    #[tokio::test]
    async fn list_models_reflects_model_mappings() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/v1/models").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], "gpt-4o");
        assert_eq!(body["data"][0]["owned_by"], "openai");
    }

    #[tokio::test]
    async fn unreachable_upstream_maps_to_bad_gateway() {
        let mut config = test_config();
        config.router.max_retries = 0;
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}]
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
    }

    #[tokio::test]
    async fn empty_fleet_returns_no_provider() {
        let mut config = test_config();
        config.providers.clear();
        let app = create_server(config).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/v1/chat/completions")
            .json(&serde_json::json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}]
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["error"]["code"], "NO_PROVIDER");
    }

    #[tokio::test]
    async fn invalid_request_bodies_are_rejected() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/v1/chat/completions")
            .json(&serde_json::json!({"model": "", "messages": []}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weight_updates_validate_and_apply() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .put("/admin/providers/openai/weight")
            .json(&serde_json::json!({"weight": -2}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = server
            .put("/admin/providers/openai/weight")
            .json(&serde_json::json!({"weight": 5}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let providers = server.get("/admin/providers").await.json::<serde_json::Value>();
        assert_eq!(providers["providers"][0]["weight"], 5);
    }

    #[tokio::test]
    async fn unknown_provider_admin_calls_return_404() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/admin/providers/ghost/breaker/reset")
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn config_endpoint_redacts_api_keys() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let body = server.get("/admin/config").await.json::<serde_json::Value>();
        assert_eq!(body["providers"]["openai"]["api_key"], "***");
        assert_eq!(body["router"]["strategy"], "round_robin");
    }

    #[tokio::test]
    async fn router_config_can_be_swapped_live() {
        let app = create_server(test_config()).await.unwrap();
        let server = TestServer::new(app).unwrap();

        let response = server
            .put("/admin/config")
            .json(&serde_json::json!({
                "strategy": "least_connections",
                "health_check_interval": "3600s",
                "max_retries": 1,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body = server.get("/admin/config").await.json::<serde_json::Value>();
        assert_eq!(body["router"]["strategy"], "least_connections");
    }
}
