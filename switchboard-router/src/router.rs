//! # Smart Router
//!
//! The public facade tying the core together: registry, strategy engine,
//! health monitor, circuit breakers, metrics and the failover orchestrator.
//!
//! ## Lifecycle
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchboard_router::config::RouterConfig;
//! use switchboard_router::provider::{create_provider, ProviderConfig};
//! use switchboard_router::router::SmartRouter;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let router = SmartRouter::new(RouterConfig::default())?;
//! let provider = create_provider(ProviderConfig::new("openai", "openai", "sk-..."))?;
//! router.add_provider(Arc::from(provider)).await?;
//! router.start().await;
//! // ... route requests ...
//! router.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Request flow
//!
//! One `route` call snapshots the eligible set (enabled, breaker-admitting,
//! healthy if the strategy requires it), asks the strategy for one
//! provider, bumps that provider's in-flight counter, and invokes the
//! upstream. A retryable failure excludes the provider and re-selects, up
//! to `max_retries` extra attempts; the error finally surfaced carries the
//! last provider's name and the attempt count. The in-flight counter is
//! maintained around every call whichever strategy is active, so
//! least-connections stays accurate after a strategy swap.

use crate::config::{RouterConfig, StrategyKind};
use crate::error::{ProviderError, RouterError};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::metrics::{MetricsSnapshot, RouterMetrics};
use crate::models::{ChatRequest, ChatResponse, SelectionResult, StreamChunk};
use crate::provider::Provider;
use crate::registry::{ProviderRecord, ProviderRegistry};
use crate::strategy::{build_strategy, SelectionStrategy};
use futures::StreamExt;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Consumer of streaming chunks, supplied by the front-end.
///
/// `deliver` returns `false` once the downstream receiver is gone, which
/// the router treats as caller cancellation.
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    async fn deliver(&mut self, chunk: StreamChunk) -> bool;
}

#[async_trait::async_trait]
impl ChunkSink for tokio::sync::mpsc::Sender<StreamChunk> {
    async fn deliver(&mut self, chunk: StreamChunk) -> bool {
        self.send(chunk).await.is_ok()
    }
}

/// Serializable per-provider status for administrative endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub weight: u32,
    pub active_connections: u64,
    pub supports_streaming: bool,
    pub breaker: crate::breaker::BreakerSnapshot,
    pub health: HealthSnapshot,
}

/// The smart router. Fully instance-scoped; no global state.
pub struct SmartRouter {
    config: Arc<RwLock<RouterConfig>>,
    registry: Arc<ProviderRegistry>,
    strategy: RwLock<Arc<dyn SelectionStrategy>>,
    metrics: Arc<RouterMetrics>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl SmartRouter {
    /// Validate the configuration and construct an empty router.
    pub fn new(config: RouterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        let strategy = build_strategy(config.strategy, &config.weights);
        let metrics = Arc::new(RouterMetrics::new(config.metrics_enabled));
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            registry: Arc::new(ProviderRegistry::new()),
            strategy: RwLock::new(strategy),
            metrics,
            monitor: Mutex::new(None),
        })
    }

    /// Start the background health monitor. Idempotent.
    pub async fn start(&self) {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_none() {
            *monitor = Some(HealthMonitor::spawn(
                self.registry.clone(),
                self.config.clone(),
            ));
            tracing::info!("smart router started");
        }
    }

    /// Stop the background health monitor and wait for it to exit.
    /// Idempotent; in-flight `route` calls are not interrupted.
    pub async fn stop(&self) {
        let handle = self.monitor.lock().await.take();
        if let Some(monitor) = handle {
            monitor.shutdown().await;
            tracing::info!("smart router stopped");
        }
    }

    /// Register a provider. Fails on a name collision.
    pub async fn add_provider(&self, provider: Arc<dyn Provider>) -> Result<(), RouterError> {
        let config = self.config.read().await;
        let weight = config.weight_for(provider.name());
        let breaker_config = config.circuit_breaker.clone();
        drop(config);

        let name = provider.name().to_string();
        let record = Arc::new(ProviderRecord::new(provider, weight, breaker_config));
        self.registry.insert(record).await?;
        tracing::info!(provider = %name, weight, "provider registered");
        Ok(())
    }

    /// Remove a provider by name. In-flight calls to it complete normally.
    pub async fn remove_provider(&self, name: &str) -> Result<(), RouterError> {
        self.registry.remove(name).await?;
        tracing::info!(provider = %name, "provider removed");
        Ok(())
    }

    /// Change a provider's weight and propagate it to the strategy engine.
    pub async fn update_provider_weight(&self, name: &str, weight: u32) -> Result<(), RouterError> {
        let record = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| RouterError::UnknownProvider {
                name: name.to_string(),
            })?;
        record.set_weight(weight);

        let mut config = self.config.write().await;
        config.weights.insert(name.to_string(), weight);
        let weights = config.weights.clone();
        drop(config);

        self.strategy.read().await.update_weights(&weights);
        tracing::info!(provider = %name, weight, "provider weight updated");
        Ok(())
    }

    /// Enable or disable a provider without removing it.
    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), RouterError> {
        let record = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| RouterError::UnknownProvider {
                name: name.to_string(),
            })?;
        record.set_enabled(enabled);
        tracing::info!(provider = %name, enabled, "provider enabled flag updated");
        Ok(())
    }

    /// Swap the live configuration.
    ///
    /// A strategy change replaces the strategy instance and rebuilds its
    /// state from the new weight table; in-flight requests keep the
    /// strategy `Arc` they already cloned and finish undisturbed.
    /// Connection counters live on the records and are preserved.
    pub async fn update_config(&self, new_config: RouterConfig) -> Result<(), RouterError> {
        new_config.validate()?;

        let old_kind = {
            let config = self.config.read().await;
            config.strategy
        };

        // Propagate per-provider parameters before the config swap so a
        // concurrent selection sees either the old or new set, never a mix
        // of breaker params and weights.
        for record in self.registry.snapshot().await {
            record
                .breaker()
                .update_config(new_config.circuit_breaker.clone());
            record.set_weight(new_config.weight_for(record.name()));
        }
        self.metrics.set_enabled(new_config.metrics_enabled);

        if new_config.strategy != old_kind {
            let fresh = build_strategy(new_config.strategy, &new_config.weights);
            *self.strategy.write().await = fresh;
            tracing::info!(
                from = old_kind.as_str(),
                to = new_config.strategy.as_str(),
                "selection strategy swapped"
            );
        } else {
            self.strategy.read().await.update_weights(&new_config.weights);
        }

        *self.config.write().await = new_config;
        Ok(())
    }

    /// Manually reset a provider's circuit breaker to closed.
    pub async fn reset_breaker(&self, name: &str) -> Result<(), RouterError> {
        let record = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| RouterError::UnknownProvider {
                name: name.to_string(),
            })?;
        record.breaker().reset();
        tracing::info!(provider = %name, "circuit breaker reset by admin");
        Ok(())
    }

    /// Immutable metrics snapshot.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Per-provider health records.
    pub async fn get_health_status(&self) -> HashMap<String, HealthSnapshot> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|r| (r.name().to_string(), r.health_snapshot()))
            .collect()
    }

    /// Full per-provider status for admin surfaces.
    pub async fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|r| ProviderStatus {
                name: r.name().to_string(),
                kind: r.provider().provider_type().to_string(),
                enabled: r.is_enabled(),
                weight: r.weight(),
                active_connections: r.active_connections(),
                supports_streaming: r.provider().supports_streaming(),
                breaker: r.breaker_snapshot(),
                health: r.health_snapshot(),
            })
            .collect()
    }

    /// Name of the active strategy.
    pub async fn strategy_name(&self) -> &'static str {
        self.strategy.read().await.name()
    }

    /// Current configuration (cloned).
    pub async fn current_config(&self) -> RouterConfig {
        self.config.read().await.clone()
    }

    /// Kind of the active strategy per the stored configuration.
    pub async fn strategy_kind(&self) -> StrategyKind {
        self.config.read().await.strategy
    }

    /// Route one unary chat request to a healthy upstream, failing over on
    /// retryable errors.
    pub async fn route(
        &self,
        request: ChatRequest,
    ) -> Result<(SelectionResult, ChatResponse), RouterError> {
        let strategy = self.strategy.read().await.clone();
        let max_retries = self.config.read().await.max_retries;

        let mut tried: HashSet<String> = HashSet::new();
        let mut attempts: u32 = 0;
        let mut last_failure: Option<(String, ProviderError)> = None;

        loop {
            let eligible: Vec<Arc<ProviderRecord>> = self
                .registry
                .eligible(Instant::now(), strategy.requires_healthy())
                .await
                .into_iter()
                .filter(|r| !tried.contains(r.name()))
                .collect();

            if eligible.is_empty() {
                return Err(match last_failure {
                    None => RouterError::NoAvailableProvider,
                    Some((provider, source)) => RouterError::Upstream {
                        provider,
                        attempts,
                        source,
                    },
                });
            }

            let selection_started = Instant::now();
            let selection = strategy.select(&eligible)?;
            let selection_time = selection_started.elapsed();

            let chosen = selection.record;
            if !chosen.breaker().acquire(Instant::now()) {
                // Lost a race for the last half-open probe slot; exclude
                // the provider and re-select without burning an attempt.
                tried.insert(chosen.name().to_string());
                continue;
            }
            attempts += 1;
            chosen.connection_opened();
            self.metrics
                .record_selection(chosen.name(), strategy.name(), selection_time);
            tracing::debug!(
                provider = chosen.name(),
                strategy = strategy.name(),
                attempt = attempts,
                reason = %selection.reason,
                "provider selected"
            );

            let call_started = Instant::now();
            let outcome = chosen.provider().chat_completion(request.clone()).await;
            let latency = call_started.elapsed();
            chosen.connection_closed();

            match outcome {
                Ok(mut response) => {
                    chosen.record_call_success();
                    self.metrics.record_call(chosen.name(), true, latency);
                    response.provider_name = Some(chosen.name().to_string());
                    let result = SelectionResult {
                        provider_name: chosen.name().to_string(),
                        strategy: strategy.name().to_string(),
                        reason: selection.reason,
                        selection_time,
                        attempts,
                    };
                    return Ok((result, response));
                }
                Err(err) => {
                    if matches!(err, ProviderError::Cancelled) {
                        chosen.record_call_neutral();
                        self.metrics.record_call(chosen.name(), false, latency);
                        return Err(RouterError::Cancelled);
                    }
                    if err.trips_breaker() {
                        chosen.record_call_failure();
                    } else {
                        chosen.record_call_neutral();
                    }
                    self.metrics.record_call(chosen.name(), false, latency);
                    tracing::warn!(
                        provider = chosen.name(),
                        attempt = attempts,
                        error = %err,
                        retryable = err.is_retryable(),
                        "upstream call failed"
                    );

                    if err.is_retryable() && attempts <= max_retries {
                        tried.insert(chosen.name().to_string());
                        last_failure = Some((chosen.name().to_string(), err));
                        continue;
                    }
                    return Err(RouterError::Upstream {
                        provider: chosen.name().to_string(),
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }

    /// Route one streaming chat request.
    ///
    /// Failover applies only until the first chunk reaches the sink: the
    /// first delivered chunk marks the call successful for retry purposes,
    /// and partial output is never replayed through another provider. A
    /// failure after that point still counts against the provider's
    /// breaker.
    pub async fn route_stream<S: ChunkSink>(
        &self,
        request: ChatRequest,
        sink: &mut S,
    ) -> Result<SelectionResult, RouterError> {
        let strategy = self.strategy.read().await.clone();
        let max_retries = self.config.read().await.max_retries;

        let mut tried: HashSet<String> = HashSet::new();
        let mut attempts: u32 = 0;
        let mut last_failure: Option<(String, ProviderError)> = None;

        loop {
            let eligible: Vec<Arc<ProviderRecord>> = self
                .registry
                .eligible(Instant::now(), strategy.requires_healthy())
                .await
                .into_iter()
                .filter(|r| !tried.contains(r.name()) && r.provider().supports_streaming())
                .collect();

            if eligible.is_empty() {
                return Err(match last_failure {
                    None => RouterError::NoAvailableProvider,
                    Some((provider, source)) => RouterError::Upstream {
                        provider,
                        attempts,
                        source,
                    },
                });
            }

            let selection_started = Instant::now();
            let selection = strategy.select(&eligible)?;
            let selection_time = selection_started.elapsed();

            let chosen = selection.record;
            if !chosen.breaker().acquire(Instant::now()) {
                tried.insert(chosen.name().to_string());
                continue;
            }
            attempts += 1;
            chosen.connection_opened();
            self.metrics
                .record_selection(chosen.name(), strategy.name(), selection_time);

            let call_started = Instant::now();
            let stream_result = chosen
                .provider()
                .stream_chat_completion(request.clone())
                .await;

            let mut stream = match stream_result {
                Ok(stream) => stream,
                Err(err) => {
                    chosen.connection_closed();
                    if matches!(err, ProviderError::Cancelled) {
                        chosen.record_call_neutral();
                        self.metrics
                            .record_call(chosen.name(), false, call_started.elapsed());
                        return Err(RouterError::Cancelled);
                    }
                    if err.trips_breaker() {
                        chosen.record_call_failure();
                    } else {
                        chosen.record_call_neutral();
                    }
                    self.metrics
                        .record_call(chosen.name(), false, call_started.elapsed());
                    tracing::warn!(
                        provider = chosen.name(),
                        attempt = attempts,
                        error = %err,
                        "stream initiation failed"
                    );
                    if err.is_retryable() && attempts <= max_retries {
                        tried.insert(chosen.name().to_string());
                        last_failure = Some((chosen.name().to_string(), err));
                        continue;
                    }
                    return Err(RouterError::Upstream {
                        provider: chosen.name().to_string(),
                        attempts,
                        source: err,
                    });
                }
            };

            let mut delivered_any = false;
            let mut mid_stream_error: Option<ProviderError> = None;
            let mut sink_closed = false;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        if !sink.deliver(chunk).await {
                            sink_closed = true;
                            break;
                        }
                        delivered_any = true;
                    }
                    Err(err) => {
                        mid_stream_error = Some(err);
                        break;
                    }
                }
            }

            let latency = call_started.elapsed();
            chosen.connection_closed();

            if sink_closed {
                // Downstream receiver dropped mid-stream; the upstream did
                // nothing wrong, so neither breaker nor failover applies.
                chosen.record_call_neutral();
                self.metrics.record_call(chosen.name(), false, latency);
                return Err(RouterError::Cancelled);
            }

            match mid_stream_error {
                None => {
                    chosen.record_call_success();
                    self.metrics.record_call(chosen.name(), true, latency);
                    return Ok(SelectionResult {
                        provider_name: chosen.name().to_string(),
                        strategy: strategy.name().to_string(),
                        reason: selection.reason,
                        selection_time,
                        attempts,
                    });
                }
                Some(err) if !delivered_any => {
                    // Failed before any output: behaves like a unary failure.
                    if err.trips_breaker() {
                        chosen.record_call_failure();
                    } else {
                        chosen.record_call_neutral();
                    }
                    self.metrics.record_call(chosen.name(), false, latency);
                    if err.is_retryable() && attempts <= max_retries {
                        tried.insert(chosen.name().to_string());
                        last_failure = Some((chosen.name().to_string(), err));
                        continue;
                    }
                    return Err(RouterError::Upstream {
                        provider: chosen.name().to_string(),
                        attempts,
                        source: err,
                    });
                }
                Some(err) => {
                    // Partial output already reached the client; record the
                    // failure but never replay through another provider.
                    if err.trips_breaker() {
                        chosen.record_call_failure();
                    } else {
                        chosen.record_call_neutral();
                    }
                    self.metrics.record_call(chosen.name(), false, latency);
                    tracing::warn!(
                        provider = chosen.name(),
                        error = %err,
                        "stream failed after partial delivery"
                    );
                    return Err(RouterError::Upstream {
                        provider: chosen.name().to_string(),
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }
}
