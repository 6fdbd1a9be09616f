//! # Provider Registry
//!
//! Thread-safe, insertion-ordered set of [`ProviderRecord`]s keyed by
//! provider name. The registry owns every piece of per-provider mutable
//! state the router needs at selection time: the enabled flag, the weight,
//! the circuit breaker, the health record and the in-flight connection
//! counter.
//!
//! Locking discipline: the record list sits behind one `tokio::sync::RwLock`
//! (readers: selection and snapshots; writers: add/remove/admin updates).
//! Per-record state uses its own synchronization — atomics for `enabled`,
//! `weight` and `active_connections`, a std `Mutex` for the health record
//! and breaker (never held across an await). When both the registry lock and
//! a record lock are needed, the registry lock is taken first.

use crate::breaker::{BreakerSnapshot, CircuitBreaker};
use crate::config::BreakerConfig;
use crate::error::RouterError;
use crate::health::{HealthRecord, HealthSnapshot};
use crate::provider::Provider;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Router-owned wrapper around one provider.
pub struct ProviderRecord {
    name: String,
    provider: Arc<dyn Provider>,
    weight: AtomicU32,
    enabled: AtomicBool,
    breaker: CircuitBreaker,
    health: Mutex<HealthRecord>,
    active_connections: AtomicI64,
}

impl ProviderRecord {
    pub fn new(provider: Arc<dyn Provider>, weight: u32, breaker_config: BreakerConfig) -> Self {
        let enabled = provider.config().enabled;
        Self {
            name: provider.name().to_string(),
            provider,
            weight: AtomicU32::new(weight),
            enabled: AtomicBool::new(enabled),
            breaker: CircuitBreaker::new(breaker_config),
            health: Mutex::new(HealthRecord::default()),
            active_connections: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn weight(&self) -> u32 {
        self.weight.load(Ordering::Relaxed)
    }

    pub fn set_weight(&self, weight: u32) {
        self.weight.store(weight, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Number of calls currently in flight. Never reported below zero.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed).max(0) as u64
    }

    /// Bump the in-flight counter around a call. The orchestrator pairs
    /// every `connection_opened` with exactly one `connection_closed`, on
    /// success and failure alike.
    pub(crate) fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        let previous = self.active_connections.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "active_connections underflow");
    }

    /// Call-time success: feeds the breaker only. Health is probe-driven.
    pub(crate) fn record_call_success(&self) {
        self.breaker.record_success();
    }

    /// Call-time failure that counts toward the breaker window.
    pub(crate) fn record_call_failure(&self) {
        self.breaker.record_failure(Instant::now());
    }

    /// Call finished with an outcome the breaker ignores (permanent 4xx,
    /// cancellation). Releases any half-open probe slot the call claimed.
    pub(crate) fn record_call_neutral(&self) {
        self.breaker.release();
    }

    pub(crate) fn probe_succeeded(&self, latency: Duration) {
        self.health.lock().unwrap().record_success(latency);
    }

    pub(crate) fn probe_failed(&self, unhealthy_threshold: u32) {
        self.health.lock().unwrap().record_failure(unhealthy_threshold);
    }

    pub fn is_healthy(&self) -> bool {
        self.health.lock().unwrap().is_healthy
    }

    /// `(health_score, last_response_time)` pair for health-based selection.
    pub fn health_metrics(&self) -> (f64, Duration) {
        let health = self.health.lock().unwrap();
        (health.health_score, health.last_response_time)
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.health.lock().unwrap().snapshot()
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }
}

/// Insertion-ordered provider set behind a read-write lock.
pub struct ProviderRegistry {
    records: RwLock<Vec<Arc<ProviderRecord>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Register a record. Fails if the name is already taken.
    pub async fn insert(&self, record: Arc<ProviderRecord>) -> Result<(), RouterError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.name() == record.name()) {
            return Err(RouterError::DuplicateProvider {
                name: record.name().to_string(),
            });
        }
        records.push(record);
        Ok(())
    }

    /// Remove a record by name. In-flight calls keep their `Arc` and finish
    /// normally; the name becomes free for re-registration immediately.
    pub async fn remove(&self, name: &str) -> Result<Arc<ProviderRecord>, RouterError> {
        let mut records = self.records.write().await;
        match records.iter().position(|r| r.name() == name) {
            Some(idx) => Ok(records.remove(idx)),
            None => Err(RouterError::UnknownProvider {
                name: name.to_string(),
            }),
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ProviderRecord>> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    /// Insertion-ordered snapshot of every record.
    pub async fn snapshot(&self) -> Vec<Arc<ProviderRecord>> {
        self.records.read().await.clone()
    }

    /// The eligible set at time `now`: enabled, breaker-admitting, and
    /// healthy when the active strategy demands it. Ordering is insertion
    /// order, which the strategies rely on for deterministic tie-breaks.
    ///
    /// The breaker check here is non-consuming; the orchestrator claims an
    /// actual admission (`breaker().acquire`) only for the provider the
    /// strategy chooses.
    pub async fn eligible(&self, now: Instant, requires_healthy: bool) -> Vec<Arc<ProviderRecord>> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| {
                r.is_enabled()
                    && r.breaker.admits(now)
                    && (!requires_healthy || r.is_healthy())
            })
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{ChatRequest, ChatResponse};
    use crate::provider::{ProbeReport, ProviderConfig};

    struct StubProvider {
        config: ProviderConfig,
    }

    impl StubProvider {
        fn named(name: &str) -> Arc<dyn Provider> {
            Arc::new(Self {
                config: ProviderConfig::new(name, "stub", ""),
            })
        }
    }

    #[async_trait::async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            &self.config.name
        }

        fn provider_type(&self) -> &str {
            "stub"
        }

        async fn chat_completion(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unsupported {
                feature: "stub".to_string(),
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

    fn record(name: &str) -> Arc<ProviderRecord> {
        Arc::new(ProviderRecord::new(
            StubProvider::named(name),
            1,
            BreakerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = ProviderRegistry::new();
        registry.insert(record("a")).await.unwrap();
        assert!(matches!(
            registry.insert(record("a")).await,
            Err(RouterError::DuplicateProvider { .. })
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn remove_unknown_fails() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.remove("ghost").await,
            Err(RouterError::UnknownProvider { .. })
        ));
    }

    #[tokio::test]
    async fn eligibility_honors_enabled_flag() {
        let registry = ProviderRegistry::new();
        registry.insert(record("a")).await.unwrap();
        registry.insert(record("b")).await.unwrap();

        registry.get("a").await.unwrap().set_enabled(false);
        let eligible = registry.eligible(Instant::now(), false).await;
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name(), "b");
    }

    #[tokio::test]
    async fn eligibility_preserves_insertion_order() {
        let registry = ProviderRegistry::new();
        for name in ["c", "a", "b"] {
            registry.insert(record(name)).await.unwrap();
        }
        let names: Vec<_> = registry
            .eligible(Instant::now(), false)
            .await
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn eligibility_excludes_open_breakers() {
        let registry = ProviderRegistry::new();
        registry.insert(record("a")).await.unwrap();
        let rec = registry.get("a").await.unwrap();
        for _ in 0..3 {
            rec.record_call_failure();
        }
        assert!(registry.eligible(Instant::now(), false).await.is_empty());
    }

    #[tokio::test]
    async fn unhealthy_records_filtered_only_when_required() {
        let registry = ProviderRegistry::new();
        registry.insert(record("a")).await.unwrap();
        let rec = registry.get("a").await.unwrap();
        for _ in 0..3 {
            rec.probe_failed(3);
        }
        assert!(!rec.is_healthy());
        assert_eq!(registry.eligible(Instant::now(), false).await.len(), 1);
        assert!(registry.eligible(Instant::now(), true).await.is_empty());
    }

    #[tokio::test]
    async fn connection_counter_pairs_up() {
        let rec = record("a");
        rec.connection_opened();
        rec.connection_opened();
        assert_eq!(rec.active_connections(), 2);
        rec.connection_closed();
        rec.connection_closed();
        assert_eq!(rec.active_connections(), 0);
    }
}
