//! # Gateway Configuration
//!
//! TOML-backed configuration for the HTTP front-end: server binding and
//! timeouts, the provider fleet, the router section (strategy, weights,
//! health cadence, breaker parameters) and logging. Environment variables
//! override the file for the handful of settings that differ between
//! deployments.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! timeout = "30s"
//! max_body_size = 10485760
//!
//! [server.cors]
//! enabled = true
//! allowed_origins = ["*"]
//!
//! [router]
//! strategy = "weighted_round_robin"
//! health_check_interval = "30s"
//! max_retries = 2
//!
//! [router.weights]
//! openai = 3
//! anthropic = 1
//!
//! [router.circuit_breaker]
//! enabled = true
//! failure_threshold = 3
//! open_cooldown = "30s"
//! half_open_max_probes = 1
//!
//! [providers.openai]
//! kind = "openai"
//! api_key = "sk-..."
//!
//! [providers.anthropic]
//! kind = "anthropic"
//! api_key = "sk-ant-..."
//! ```
//!
//! ## Environment overrides
//!
//! - `GATEWAY_HOST` — server host
//! - `GATEWAY_PORT` — server port
//! - `GATEWAY_TIMEOUT` — request timeout (duration string)
//! - `GATEWAY_LOG_LEVEL` — logging level

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use switchboard_router::config::RouterConfig;
use switchboard_router::duration_serde;
use switchboard_router::provider::ProviderConfig;

pub use switchboard_router::duration_serde::parse_duration;

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider fleet keyed by registry name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Smart-router settings handed to the core
    #[serde(default)]
    pub router: RouterConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Whole-request timeout, including streaming responses
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS settings
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            timeout: Duration::from_secs(120),
            max_body_size: 10 * 1024 * 1024,
            cors: CorsConfig::default(),
        }
    }
}

/// CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level filter: trace, debug, info, warn, error
    pub level: String,
    /// Output format: "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: HashMap::new(),
            router: RouterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config file {path}: {e}"))?;
        let mut config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("cannot parse config file {path}: {e}"))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Validate settings before the server starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must not be zero");
        }
        if self.server.max_body_size == 0 {
            anyhow::bail!("server.max_body_size must not be zero");
        }
        if self.server.timeout.is_zero() {
            anyhow::bail!("server.timeout must not be zero");
        }
        self.router
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        for (name, provider) in &self.providers {
            if provider.kind.is_empty() {
                anyhow::bail!("provider {name} is missing a kind");
            }
        }
        Ok(())
    }

    /// Apply `GATEWAY_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = env::var("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("GATEWAY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("GATEWAY_PORT is not a valid port: {port}"))?;
        }
        if let Ok(timeout) = env::var("GATEWAY_TIMEOUT") {
            self.server.timeout =
                parse_duration(&timeout).map_err(|e| anyhow::anyhow!("GATEWAY_TIMEOUT: {e}"))?;
        }
        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Clone with provider API keys blanked for admin display.
    pub fn redacted(&self) -> Config {
        let mut clone = self.clone();
        for provider in clone.providers.values_mut() {
            if !provider.api_key.is_empty() {
                provider.api_key = "***".to_string();
            }
        }
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_port_and_body_size_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 3000;
        config.server.max_body_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip_with_router_section() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            timeout = "45s"
            max_body_size = 1048576

            [router]
            strategy = "least_connections"
            health_check_interval = "10s"
            max_retries = 1

            [providers.main]
            kind = "openai"
            api_key = "sk-test"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout, Duration::from_secs(45));
        assert_eq!(
            config.router.strategy,
            switchboard_router::config::StrategyKind::LeastConnections
        );
        assert_eq!(config.router.max_retries, 1);
        assert_eq!(config.providers["main"].kind, "openai");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn redaction_blanks_api_keys() {
        let mut config = Config::default();
        config.providers.insert(
            "p".to_string(),
            ProviderConfig::new("p", "openai", "sk-secret"),
        );
        let redacted = config.redacted();
        assert_eq!(redacted.providers["p"].api_key, "***");
        // The original is untouched.
        assert_eq!(config.providers["p"].api_key, "sk-secret");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        env::set_var("GATEWAY_HOST", "0.0.0.0");
        env::set_var("GATEWAY_PORT", "8081");
        env::set_var("GATEWAY_TIMEOUT", "60s");
        env::set_var("GATEWAY_LOG_LEVEL", "debug");

        config.apply_env_overrides().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.timeout, Duration::from_secs(60));
        assert_eq!(config.logging.level, "debug");

        env::remove_var("GATEWAY_HOST");
        env::remove_var("GATEWAY_PORT");
        env::remove_var("GATEWAY_TIMEOUT");
        env::remove_var("GATEWAY_LOG_LEVEL");
    }
}
