//! Health-based selection: pick the provider with the best health score,
//! breaking ties toward lower last-probe latency and then insertion order.
//! When every eligible score is equal — which is the normal state right
//! after start-up, before the first probe cycle — the strategy degrades to
//! round-robin so early traffic still spreads across the fleet.

use crate::error::RouterError;
use crate::registry::ProviderRecord;
use crate::strategy::{Selection, SelectionStrategy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SCORE_EPSILON: f64 = 1e-9;

pub struct HealthBased {
    fallback_counter: AtomicU64,
}

impl HealthBased {
    pub fn new() -> Self {
        Self {
            fallback_counter: AtomicU64::new(0),
        }
    }
}

impl Default for HealthBased {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for HealthBased {
    fn select(&self, eligible: &[Arc<ProviderRecord>]) -> Result<Selection, RouterError> {
        if eligible.is_empty() {
            return Err(RouterError::NoAvailableProvider);
        }

        let stats: Vec<_> = eligible.iter().map(|r| r.health_metrics()).collect();
        let max_score = stats.iter().map(|(s, _)| *s).fold(f64::MIN, f64::max);
        let min_score = stats.iter().map(|(s, _)| *s).fold(f64::MAX, f64::min);

        if max_score - min_score < SCORE_EPSILON {
            let slot = self.fallback_counter.fetch_add(1, Ordering::Relaxed);
            let index = (slot % eligible.len() as u64) as usize;
            return Ok(Selection {
                record: eligible[index].clone(),
                reason: format!("scores tied at {max_score:.3}; round-robin fallback"),
            });
        }

        let mut best_index = 0;
        for index in 1..eligible.len() {
            let (score, latency) = stats[index];
            let (best_score, best_latency) = stats[best_index];
            let strictly_better = score > best_score + SCORE_EPSILON;
            let tie_on_latency =
                (score - best_score).abs() <= SCORE_EPSILON && latency < best_latency;
            if strictly_better || tie_on_latency {
                best_index = index;
            }
        }

        let (score, _) = stats[best_index];
        Ok(Selection {
            record: eligible[best_index].clone(),
            reason: format!("health score {score:.3}"),
        })
    }

    fn update_weights(&self, _weights: &HashMap<String, u32>) {}

    fn reset(&self) {
        self.fallback_counter.store(0, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "health_based"
    }

    fn requires_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::record;
    use std::time::Duration;

    #[test]
    fn equal_scores_round_robin() {
        let strategy = HealthBased::new();
        let eligible = vec![record("a", 1), record("b", 1), record("c", 1)];

        let picks: Vec<String> = (0..3)
            .map(|_| strategy.select(&eligible).unwrap().record.name().to_string())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c"]);
    }

    #[test]
    fn best_score_wins() {
        let strategy = HealthBased::new();
        let good = record("good", 1);
        let bad = record("bad", 1);
        good.probe_succeeded(Duration::from_millis(5));
        bad.probe_succeeded(Duration::from_millis(5));
        bad.probe_failed(3);

        let eligible = vec![bad.clone(), good.clone()];
        for _ in 0..5 {
            assert_eq!(strategy.select(&eligible).unwrap().record.name(), "good");
        }
    }

    #[test]
    fn score_tie_breaks_on_latency() {
        let strategy = HealthBased::new();
        // Two providers land on the same 0.5 score through different
        // histories: a perfect record at ln(2) seconds of latency, and a
        // 50% record at zero latency. The faster one must win the tie.
        let slow = record("slow", 1);
        slow.probe_succeeded(Duration::from_secs_f64(std::f64::consts::LN_2));
        let fast = record("fast", 1);
        fast.probe_succeeded(Duration::from_millis(0));
        fast.probe_failed(3);
        // A third provider with a clearly lower score keeps the set out of
        // the all-equal round-robin fallback.
        let poor = record("poor", 1);
        poor.probe_succeeded(Duration::from_millis(0));
        poor.probe_failed(3);
        poor.probe_failed(3);

        let eligible = vec![slow, fast, poor];
        for _ in 0..3 {
            assert_eq!(strategy.select(&eligible).unwrap().record.name(), "fast");
        }
    }

    #[test]
    fn empty_set_is_an_error() {
        let strategy = HealthBased::new();
        assert!(matches!(
            strategy.select(&[]),
            Err(RouterError::NoAvailableProvider)
        ));
    }
}
