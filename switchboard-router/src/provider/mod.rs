//! # Provider Capability Layer
//!
//! The router consumes upstream LLM services through the [`Provider`] trait:
//! a name, a unary chat call, an optional streaming call, and a health
//! probe. Everything else about an upstream — wire format, authentication,
//! model naming — lives inside its adapter.
//!
//! ## Supported upstreams
//!
//! - **openai** — OpenAI and any API-compatible server
//! - **anthropic** — the Messages API, converted to the normalized shape
//! - **zhipu** — GLM models behind Zhipu's OpenAI-compatible endpoint
//!
//! ## Usage
//!
//! ```rust
//! use switchboard_router::provider::{create_provider, ProviderConfig};
//!
//! let config = ProviderConfig::new("openai-primary", "openai", "sk-...")
//!     .with_base_url("https://api.openai.com/v1");
//! let provider = create_provider(config)?;
//! # Ok::<(), switchboard_router::error::ProviderError>(())
//! ```
//!
//! Streaming is a capability, not a requirement: adapters that cannot
//! stream keep the default [`Provider::stream_chat_completion`], and the
//! router checks [`Provider::supports_streaming`] before selecting one for
//! a streaming request.

use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse, StreamChunk};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

pub mod anthropic;
pub mod http_client;
pub mod openai;
pub mod zhipu;

/// Lazy, finite, non-restartable sequence of streaming chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Outcome of one health probe.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Round-trip time of the probe request
    pub latency: Duration,
    /// Optional upstream detail (version string, model count, ...)
    pub detail: Option<String>,
}

/// Trait implemented by every upstream adapter.
///
/// Identity is [`name`](Provider::name): unique within one router instance.
/// The router requires only `name`, `chat_completion` and `health_check`;
/// streaming is detected by capability.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider identifier within the router.
    fn name(&self) -> &str;

    /// Adapter kind, e.g. `"openai"` or `"anthropic"`.
    fn provider_type(&self) -> &str;

    /// Whether [`stream_chat_completion`](Provider::stream_chat_completion)
    /// is implemented.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Perform a unary chat completion.
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Perform a streaming chat completion.
    async fn stream_chat_completion(
        &self,
        _request: ChatRequest,
    ) -> Result<ChunkStream, ProviderError> {
        Err(ProviderError::Unsupported {
            feature: "streaming".to_string(),
        })
    }

    /// Probe the upstream for liveness.
    async fn health_check(&self) -> Result<ProbeReport, ProviderError>;

    /// Static configuration this provider was built from.
    fn config(&self) -> &ProviderConfig;
}

/// Configuration for one upstream adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique instance name (registry key)
    #[serde(default)]
    pub name: String,
    /// Adapter kind dispatched by [`create_provider`]
    pub kind: String,
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Optional override of the adapter's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout
    #[serde(with = "crate::duration_serde", default = "default_timeout")]
    pub timeout: Duration,
    /// Client model names mapped to provider model names
    #[serde(default)]
    pub model_mapping: HashMap<String, String>,
    /// Custom HTTP headers for every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Whether this provider starts enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            api_key: api_key.into(),
            base_url: None,
            timeout: default_timeout(),
            model_mapping: HashMap::new(),
            headers: HashMap::new(),
            enabled: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.model_mapping.insert(from.into(), to.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Resolve a client-facing model name through the mapping table.
    pub fn map_model(&self, model: &str) -> String {
        self.model_mapping
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_string())
    }
}

/// Build an adapter instance from its configuration.
///
/// Dispatches on [`ProviderConfig::kind`]; unknown kinds are a
/// configuration error.
pub fn create_provider(config: ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config.kind.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiProvider::new(config)?)),
        "anthropic" => Ok(Box::new(anthropic::AnthropicProvider::new(config)?)),
        "zhipu" => Ok(Box::new(zhipu::ZhipuProvider::new(config)?)),
        other => Err(ProviderError::Configuration {
            message: format!("unsupported provider kind: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = ProviderConfig::new("p0", "openai", "key")
            .with_base_url("http://localhost:8080/v1")
            .with_timeout(Duration::from_secs(5))
            .with_model_mapping("gpt-4", "gpt-4o")
            .with_header("x-extra", "1");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.map_model("gpt-4"), "gpt-4o");
        assert_eq!(config.map_model("unmapped"), "unmapped");
        assert!(config.enabled);
    }

    #[test]
    fn factory_rejects_unknown_kind() {
        let config = ProviderConfig::new("p0", "carrier-pigeon", "key");
        assert!(matches!(
            create_provider(config),
            Err(ProviderError::Configuration { .. })
        ));
    }

    #[test]
    fn factory_builds_known_kinds() {
        for kind in ["openai", "anthropic", "zhipu"] {
            let provider = create_provider(ProviderConfig::new("p", kind, "key")).unwrap();
            assert_eq!(provider.provider_type(), kind);
            assert!(provider.supports_streaming());
        }
    }
}
