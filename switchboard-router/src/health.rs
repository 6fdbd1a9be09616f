//! # Health Monitoring
//!
//! Each provider record carries a [`HealthRecord`] updated exclusively by
//! the background probe loop: call-time failures go to the circuit breaker,
//! probe-time failures go here. The two signals stay independent so a flaky
//! health endpoint cannot trip a breaker and call failures cannot mask a
//! recovering probe.
//!
//! The [`HealthMonitor`] is a single long-lived tokio task per router. Every
//! `health_check_interval` it probes all registered providers in parallel,
//! each probe bounded by its own timeout (half the interval unless
//! configured), and folds the outcome into the provider's record.
//!
//! ## Health score
//!
//! ```text
//! health_score = clamp(success_count / max(1, total) * exp(-latency_secs), 0, 1)
//! ```
//!
//! The latency factor is 1 at zero latency and 1/e at one second, so a slow
//! but reliable provider ranks below a fast one with the same success rate.

use crate::config::RouterConfig;
use crate::registry::{ProviderRecord, ProviderRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Rolling health state for one provider.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_response_time: Duration,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub health_score: f64,
}

impl Default for HealthRecord {
    fn default() -> Self {
        // Optimistic until the first probe says otherwise.
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_response_time: Duration::ZERO,
            last_checked_at: None,
            success_count: 0,
            failure_count: 0,
            health_score: 1.0,
        }
    }
}

impl HealthRecord {
    /// Fold in a successful probe.
    pub fn record_success(&mut self, latency: Duration) {
        self.consecutive_failures = 0;
        self.consecutive_successes += 1;
        self.success_count += 1;
        self.last_response_time = latency;
        self.last_checked_at = Some(chrono::Utc::now());
        self.is_healthy = true;
        self.recompute_score();
    }

    /// Fold in a failed or timed-out probe.
    pub fn record_failure(&mut self, unhealthy_threshold: u32) {
        self.consecutive_successes = 0;
        self.consecutive_failures += 1;
        self.failure_count += 1;
        self.last_checked_at = Some(chrono::Utc::now());
        if self.consecutive_failures >= unhealthy_threshold {
            self.is_healthy = false;
        }
        self.recompute_score();
    }

    fn recompute_score(&mut self) {
        let total = (self.success_count + self.failure_count).max(1) as f64;
        let success_rate = self.success_count as f64 / total;
        let latency_factor = (-self.last_response_time.as_secs_f64()).exp();
        self.health_score = (success_rate * latency_factor).clamp(0.0, 1.0);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            is_healthy: self.is_healthy,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            last_response_time_ms: self.last_response_time.as_millis() as u64,
            last_checked_at: self.last_checked_at,
            success_count: self.success_count,
            failure_count: self.failure_count,
            health_score: self.health_score,
        }
    }
}

/// Serializable view of a [`HealthRecord`] for admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_response_time_ms: u64,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub success_count: u64,
    pub failure_count: u64,
    pub health_score: f64,
}

/// Handle to the background probe loop.
///
/// Created by [`HealthMonitor::spawn`], torn down by
/// [`HealthMonitor::shutdown`], which signals the task and waits for it to
/// exit.
pub struct HealthMonitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the probe loop against the given registry.
    ///
    /// The loop re-reads the shared config on every cycle so interval and
    /// timeout changes from `update_config` take effect without a restart.
    pub fn spawn(registry: Arc<ProviderRegistry>, config: Arc<RwLock<RouterConfig>>) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            tracing::debug!("health monitor started");
            loop {
                let (interval, probe_timeout, threshold) = {
                    let cfg = config.read().await;
                    (
                        cfg.health_check_interval,
                        cfg.effective_probe_timeout(),
                        cfg.circuit_breaker.failure_threshold.max(1),
                    )
                };
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
                let records = registry.snapshot().await;
                let probes = records
                    .iter()
                    .map(|record| probe_one(record.clone(), probe_timeout, threshold));
                futures::future::join_all(probes).await;
            }
            tracing::debug!("health monitor stopped");
        });
        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

async fn probe_one(record: Arc<ProviderRecord>, probe_timeout: Duration, threshold: u32) {
    let outcome = tokio::time::timeout(probe_timeout, record.provider().health_check()).await;
    match outcome {
        Ok(Ok(report)) => {
            tracing::trace!(
                provider = record.name(),
                latency_ms = report.latency.as_millis() as u64,
                "health probe succeeded"
            );
            record.probe_succeeded(report.latency);
        }
        Ok(Err(e)) => {
            tracing::debug!(provider = record.name(), error = %e, "health probe failed");
            record.probe_failed(threshold);
        }
        Err(_) => {
            tracing::debug!(provider = record.name(), "health probe timed out");
            record.probe_failed(threshold);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_optimistic() {
        let record = HealthRecord::default();
        assert!(record.is_healthy);
        assert_eq!(record.health_score, 1.0);
        assert!(record.last_checked_at.is_none());
    }

    #[test]
    fn single_success_restores_health() {
        let mut record = HealthRecord::default();
        for _ in 0..3 {
            record.record_failure(3);
        }
        assert!(!record.is_healthy);

        record.record_success(Duration::from_millis(10));
        assert!(record.is_healthy);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.consecutive_successes, 1);
    }

    #[test]
    fn unhealthy_only_at_threshold() {
        let mut record = HealthRecord::default();
        record.record_failure(3);
        record.record_failure(3);
        assert!(record.is_healthy);
        record.record_failure(3);
        assert!(!record.is_healthy);
    }

    #[test]
    fn score_decreases_with_latency() {
        let mut fast = HealthRecord::default();
        fast.record_success(Duration::from_millis(0));
        let mut slow = HealthRecord::default();
        slow.record_success(Duration::from_secs(1));

        assert!(fast.health_score > slow.health_score);
        // exp(-1) at one second, per the score shape.
        assert!((slow.health_score - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn score_blends_success_rate() {
        let mut record = HealthRecord::default();
        record.record_success(Duration::ZERO);
        record.record_failure(3);
        // 1 success of 2 observations at zero latency.
        assert!((record.health_score - 0.5).abs() < 1e-9);
    }
}
