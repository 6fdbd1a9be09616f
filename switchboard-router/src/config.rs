//! # Router Configuration
//!
//! [`RouterConfig`] carries everything the router needs at construction
//! time and everything an administrator may swap at runtime through
//! `update_config`: the selection strategy, per-provider weights, the
//! health-probe cadence, retry budget and circuit-breaker parameters.
//!
//! Durations accept human-readable strings (`"30s"`, `"100ms"`) via
//! [`crate::duration_serde`].

use crate::duration_serde;
use crate::error::RouterError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The four interchangeable selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Cycle through eligible providers in insertion order
    RoundRobin,
    /// Smooth weighted round-robin over configured weights
    WeightedRoundRobin,
    /// Pick the provider with the fewest in-flight calls
    LeastConnections,
    /// Pick the provider with the best health score
    HealthBased,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::WeightedRoundRobin => "weighted_round_robin",
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::HealthBased => "health_based",
        }
    }
}

/// Circuit-breaker parameters, per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Whether breakers gate selection at all
    pub enabled: bool,
    /// Call failures in the window before the breaker opens
    pub failure_threshold: u32,
    /// How long an open breaker rejects selections before probing
    #[serde(with = "duration_serde")]
    pub open_cooldown: Duration,
    /// Admissions allowed while half-open
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 3,
            open_cooldown: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

/// Complete router configuration.
///
/// # Example
///
/// ```rust
/// use switchboard_router::config::{RouterConfig, StrategyKind};
///
/// let config = RouterConfig {
///     strategy: StrategyKind::WeightedRoundRobin,
///     weights: [("openai".to_string(), 3), ("anthropic".to_string(), 1)]
///         .into_iter()
///         .collect(),
///     ..Default::default()
/// };
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Active selection strategy
    pub strategy: StrategyKind,
    /// Per-provider weights for weighted strategies; absent names default to 1
    #[serde(default)]
    pub weights: HashMap<String, u32>,
    /// Cadence of the background health-probe loop
    #[serde(with = "duration_serde")]
    pub health_check_interval: Duration,
    /// Per-probe timeout; defaults to half the probe interval when absent
    #[serde(default, with = "option_duration_serde")]
    pub probe_timeout: Option<Duration>,
    /// Additional attempts allowed after the first failure
    pub max_retries: u32,
    /// Circuit-breaker parameters applied to every provider
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,
    /// Whether the metrics collector records anything
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::RoundRobin,
            weights: HashMap::new(),
            health_check_interval: Duration::from_secs(30),
            probe_timeout: None,
            max_retries: 2,
            circuit_breaker: BreakerConfig::default(),
            metrics_enabled: true,
        }
    }
}

impl RouterConfig {
    /// Validate the configuration before it takes effect.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.health_check_interval.is_zero() {
            return Err(RouterError::InvalidConfig {
                message: "health_check_interval must be greater than zero".to_string(),
            });
        }
        if let Some(timeout) = self.probe_timeout {
            if timeout.is_zero() {
                return Err(RouterError::InvalidConfig {
                    message: "probe_timeout must be greater than zero".to_string(),
                });
            }
        }
        if self.circuit_breaker.enabled {
            if self.circuit_breaker.failure_threshold == 0 {
                return Err(RouterError::InvalidConfig {
                    message: "circuit_breaker.failure_threshold must be at least 1".to_string(),
                });
            }
            if self.circuit_breaker.half_open_max_probes == 0 {
                return Err(RouterError::InvalidConfig {
                    message: "circuit_breaker.half_open_max_probes must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Effective per-probe timeout: configured value or half the interval.
    pub fn effective_probe_timeout(&self) -> Duration {
        self.probe_timeout
            .unwrap_or_else(|| self.health_check_interval / 2)
    }

    /// Weight for a provider name, defaulting to 1.
    pub fn weight_for(&self, name: &str) -> u32 {
        self.weights.get(name).copied().unwrap_or(1)
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => crate::duration_serde::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => crate::duration_serde::deserialize(v)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RouterConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = RouterConfig {
            health_check_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RouterError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_threshold_is_rejected_when_breaker_enabled() {
        let config = RouterConfig {
            circuit_breaker: BreakerConfig {
                failure_threshold: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let disabled = RouterConfig {
            circuit_breaker: BreakerConfig {
                enabled: false,
                failure_threshold: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn probe_timeout_defaults_to_half_interval() {
        let config = RouterConfig {
            health_check_interval: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(config.effective_probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn strategy_kind_deserializes_snake_case() {
        let kind: StrategyKind = serde_json::from_str("\"least_connections\"").unwrap();
        assert_eq!(kind, StrategyKind::LeastConnections);
        assert_eq!(kind.as_str(), "least_connections");
    }

    #[test]
    fn missing_weights_default_to_one() {
        let config = RouterConfig {
            weights: [("a".to_string(), 4)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(config.weight_for("a"), 4);
        assert_eq!(config.weight_for("b"), 1);
    }
}
