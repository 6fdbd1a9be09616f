//! # Switchboard Router
//!
//! The smart-routing core of the Switchboard gateway: a thread-safe pool
//! of upstream LLM providers, four interchangeable selection strategies,
//! per-provider circuit breakers, a background health monitor, and a
//! failover orchestrator that retries transient upstream failures across
//! distinct providers.
//!
//! ## Overview
//!
//! - **[`router::SmartRouter`]** — public facade: lifecycle, admin
//!   operations, `route` and `route_stream`
//! - **[`registry`]** — insertion-ordered provider set with per-provider
//!   breaker, health and load state
//! - **[`strategy`]** — round-robin, smooth weighted round-robin,
//!   least-connections and health-based selectors
//! - **[`health`]** — periodic probe loop and health scoring
//! - **[`breaker`]** — closed/open/half-open availability gate
//! - **[`metrics`]** — selection and call counters with snapshots
//! - **[`provider`]** — the upstream capability trait plus OpenAI,
//!   Anthropic and Zhipu adapters
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchboard_router::config::{RouterConfig, StrategyKind};
//! use switchboard_router::models::{ChatRequest, Message};
//! use switchboard_router::provider::{create_provider, ProviderConfig};
//! use switchboard_router::router::SmartRouter;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let router = SmartRouter::new(RouterConfig {
//!     strategy: StrategyKind::RoundRobin,
//!     max_retries: 1,
//!     ..Default::default()
//! })?;
//!
//! let openai = create_provider(ProviderConfig::new("openai", "openai", "sk-..."))?;
//! let anthropic = create_provider(ProviderConfig::new("anthropic", "anthropic", "sk-ant-..."))?;
//! router.add_provider(Arc::from(openai)).await?;
//! router.add_provider(Arc::from(anthropic)).await?;
//! router.start().await;
//!
//! let (selection, response) = router
//!     .route(ChatRequest {
//!         model: "gpt-4o".to_string(),
//!         messages: vec![Message::user("Hello!")],
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{} answered in {} attempt(s)", selection.provider_name, selection.attempts);
//! # drop(response);
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod config;
pub mod duration_serde;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod registry;
pub mod router;
pub mod strategy;

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use config::{BreakerConfig, RouterConfig, StrategyKind};
pub use error::{ProviderError, RouterError};
pub use health::{HealthMonitor, HealthRecord, HealthSnapshot};
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use models::{
    ChatRequest, ChatResponse, Choice, Message, Role, SelectionResult, StreamChunk, Usage,
};
pub use provider::{create_provider, ChunkStream, ProbeReport, Provider, ProviderConfig};
pub use registry::{ProviderRecord, ProviderRegistry};
pub use router::{ChunkSink, ProviderStatus, SmartRouter};
pub use strategy::{build_strategy, Selection, SelectionStrategy};

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
