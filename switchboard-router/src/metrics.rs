//! # Metrics Collector
//!
//! Lock-light counters for selections, request outcomes and per-provider
//! call latency. Hot-path counters are atomics; per-provider distributions
//! live in `DashMap`s so concurrent `route` calls never serialize on a
//! global lock. [`RouterMetrics::snapshot`] produces an immutable,
//! serializable view for the `/metrics` endpoint.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
struct LatencyStats {
    count: u64,
    mean_ms: f64,
    max_ms: f64,
}

impl LatencyStats {
    fn record(&mut self, latency: Duration) {
        let ms = latency.as_secs_f64() * 1000.0;
        self.count += 1;
        self.mean_ms += (ms - self.mean_ms) / self.count as f64;
        if ms > self.max_ms {
            self.max_ms = ms;
        }
    }
}

/// Thread-safe metrics for one router instance.
pub struct RouterMetrics {
    enabled: AtomicBool,
    selections_total: AtomicU64,
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_failed: AtomicU64,
    selections_by_provider: DashMap<String, u64>,
    selections_by_strategy: DashMap<String, u64>,
    selection_latency: Mutex<LatencyStats>,
    call_latency: DashMap<String, LatencyStats>,
}

impl RouterMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            selections_total: AtomicU64::new(0),
            requests_total: AtomicU64::new(0),
            requests_success: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            selections_by_provider: DashMap::new(),
            selections_by_strategy: DashMap::new(),
            selection_latency: Mutex::new(LatencyStats::default()),
            call_latency: DashMap::new(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record one strategy selection.
    pub fn record_selection(&self, provider: &str, strategy: &str, latency: Duration) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        self.selections_total.fetch_add(1, Ordering::Relaxed);
        *self
            .selections_by_provider
            .entry(provider.to_string())
            .or_insert(0) += 1;
        *self
            .selections_by_strategy
            .entry(strategy.to_string())
            .or_insert(0) += 1;
        self.selection_latency.lock().unwrap().record(latency);
    }

    /// Record one completed upstream call.
    pub fn record_call(&self, provider: &str, success: bool, latency: Duration) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.call_latency
            .entry(provider.to_string())
            .or_default()
            .record(latency);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let selection_latency = self.selection_latency.lock().unwrap().clone();
        MetricsSnapshot {
            selections_total: self.selections_total.load(Ordering::Relaxed),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            avg_selection_latency_us: selection_latency.mean_ms * 1000.0,
            selections_by_provider: self
                .selections_by_provider
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            selections_by_strategy: self
                .selections_by_strategy
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            call_latency: self
                .call_latency
                .iter()
                .map(|e| {
                    (
                        e.key().clone(),
                        CallLatencySnapshot {
                            count: e.value().count,
                            avg_ms: e.value().mean_ms,
                            max_ms: e.value().max_ms,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Immutable metrics view.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub selections_total: u64,
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    pub avg_selection_latency_us: f64,
    pub selections_by_provider: HashMap<String, u64>,
    pub selections_by_strategy: HashMap<String, u64>,
    pub call_latency: HashMap<String, CallLatencySnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallLatencySnapshot {
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = RouterMetrics::new(true);
        metrics.record_selection("a", "round_robin", Duration::from_micros(10));
        metrics.record_selection("b", "round_robin", Duration::from_micros(30));
        metrics.record_call("a", true, Duration::from_millis(50));
        metrics.record_call("a", false, Duration::from_millis(150));

        let snap = metrics.snapshot();
        assert_eq!(snap.selections_total, 2);
        assert_eq!(snap.selections_by_provider["a"], 1);
        assert_eq!(snap.selections_by_strategy["round_robin"], 2);
        assert_eq!(snap.requests_total, 2);
        assert_eq!(snap.requests_success, 1);
        assert_eq!(snap.requests_failed, 1);
        let stats = &snap.call_latency["a"];
        assert_eq!(stats.count, 2);
        assert!((stats.avg_ms - 100.0).abs() < 1.0);
        assert!(stats.max_ms >= 150.0);
    }

    #[test]
    fn disabled_collector_records_nothing() {
        let metrics = RouterMetrics::new(false);
        metrics.record_selection("a", "round_robin", Duration::from_micros(10));
        metrics.record_call("a", true, Duration::from_millis(5));
        let snap = metrics.snapshot();
        assert_eq!(snap.selections_total, 0);
        assert_eq!(snap.requests_total, 0);
        assert!(snap.call_latency.is_empty());
    }

    #[test]
    fn running_mean_is_stable() {
        let metrics = RouterMetrics::new(true);
        for _ in 0..100 {
            metrics.record_selection("a", "s", Duration::from_micros(20));
        }
        let snap = metrics.snapshot();
        assert!((snap.avg_selection_latency_us - 20.0).abs() < 0.5);
    }
}
