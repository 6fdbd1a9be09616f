//! # Strategy Engine
//!
//! Four interchangeable selectors behind one object-safe trait:
//!
//! - [`round_robin::RoundRobin`] — cycle in insertion order
//! - [`weighted::WeightedRoundRobin`] — nginx-style smooth weighted schedule
//! - [`least_connections::LeastConnections`] — fewest in-flight calls wins
//! - [`health_based::HealthBased`] — best health score wins
//!
//! Strategies are stateful (counters, smoothing state) and every
//! implementation synchronizes internally, so concurrent `select` calls are
//! safe. Selection is synchronous over an eligibility snapshot and never
//! touches the network; all four selectors are O(n) in the size of the
//! eligible set.
//!
//! Swapping strategies (`update_config`) builds a fresh instance via
//! [`build_strategy`], which reconstructs weights from configuration and
//! zeroes all smoothing state. In-flight connection counters live on the
//! provider records, not in the strategy, so they survive the swap.

use crate::config::StrategyKind;
use crate::error::RouterError;
use crate::registry::ProviderRecord;
use std::collections::HashMap;
use std::sync::Arc;

pub mod health_based;
pub mod least_connections;
pub mod round_robin;
pub mod weighted;

/// One strategy decision.
pub struct Selection {
    /// The chosen provider record
    pub record: Arc<ProviderRecord>,
    /// Human-readable explanation of the choice
    pub reason: String,
}

/// Common contract for all selectors.
pub trait SelectionStrategy: Send + Sync {
    /// Pick one provider from the eligible snapshot.
    ///
    /// The slice is in registry insertion order; strategies use that order
    /// for deterministic tie-breaking. An empty slice is
    /// [`RouterError::NoAvailableProvider`].
    fn select(&self, eligible: &[Arc<ProviderRecord>]) -> Result<Selection, RouterError>;

    /// Merge new weights into the strategy's weight table. No-op for
    /// strategies that ignore weights.
    fn update_weights(&self, weights: &HashMap<String, u32>);

    /// Clear accumulated selection state (counters, smoothing state).
    fn reset(&self);

    /// Stable identifier used in metrics and `SelectionResult`.
    fn name(&self) -> &'static str;

    /// Whether the eligible set must be filtered to healthy providers.
    fn requires_healthy(&self) -> bool {
        false
    }
}

/// Construct the strategy for a [`StrategyKind`], seeding weighted state
/// from the configured weight table.
pub fn build_strategy(
    kind: StrategyKind,
    weights: &HashMap<String, u32>,
) -> Arc<dyn SelectionStrategy> {
    match kind {
        StrategyKind::RoundRobin => Arc::new(round_robin::RoundRobin::new()),
        StrategyKind::WeightedRoundRobin => {
            Arc::new(weighted::WeightedRoundRobin::new(weights.clone()))
        }
        StrategyKind::LeastConnections => {
            Arc::new(least_connections::LeastConnections::new())
        }
        StrategyKind::HealthBased => Arc::new(health_based::HealthBased::new()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::BreakerConfig;
    use crate::error::ProviderError;
    use crate::models::{ChatRequest, ChatResponse};
    use crate::provider::{ProbeReport, Provider, ProviderConfig};
    use crate::registry::ProviderRecord;
    use std::sync::Arc;
    use std::time::Duration;

    struct InertProvider {
        config: ProviderConfig,
    }

    #[async_trait::async_trait]
    impl Provider for InertProvider {
        fn name(&self) -> &str {
            &self.config.name
        }

        fn provider_type(&self) -> &str {
            "inert"
        }

        async fn chat_completion(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unsupported {
                feature: "inert".to_string(),
            })
        }

        async fn health_check(&self) -> Result<ProbeReport, ProviderError> {
            Ok(ProbeReport {
                latency: Duration::from_millis(1),
                detail: None,
            })
        }

        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    /// Build a detached record for strategy unit tests.
    pub(crate) fn record(name: &str, weight: u32) -> Arc<ProviderRecord> {
        Arc::new(ProviderRecord::new(
            Arc::new(InertProvider {
                config: ProviderConfig::new(name, "inert", ""),
            }),
            weight,
            BreakerConfig::default(),
        ))
    }
}
