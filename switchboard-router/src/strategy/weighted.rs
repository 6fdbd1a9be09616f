//! Smooth weighted round-robin (the nginx algorithm).
//!
//! Every selection adds each provider's weight to its running `current`
//! value, picks the largest `current` (ties break toward insertion order),
//! then subtracts the total weight from the winner. Over `Σweight`
//! consecutive selections each provider is chosen exactly `weight` times,
//! and the schedule interleaves heavy providers instead of bursting them.

use crate::error::RouterError;
use crate::registry::ProviderRecord;
use crate::strategy::{Selection, SelectionStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Slot {
    weight: i64,
    current: i64,
}

impl Default for Slot {
    fn default() -> Self {
        // Providers the configuration never mentioned participate with
        // weight 1 rather than being starved.
        Self {
            weight: 1,
            current: 0,
        }
    }
}

pub struct WeightedRoundRobin {
    slots: Mutex<HashMap<String, Slot>>,
}

impl WeightedRoundRobin {
    pub fn new(weights: HashMap<String, u32>) -> Self {
        let slots = weights
            .into_iter()
            .map(|(name, weight)| {
                (
                    name,
                    Slot {
                        weight: weight as i64,
                        current: 0,
                    },
                )
            })
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }
}

impl SelectionStrategy for WeightedRoundRobin {
    fn select(&self, eligible: &[Arc<ProviderRecord>]) -> Result<Selection, RouterError> {
        if eligible.is_empty() {
            return Err(RouterError::NoAvailableProvider);
        }

        let mut slots = self.slots.lock().unwrap();

        let mut total: i64 = 0;
        for record in eligible {
            let slot = slots.entry(record.name().to_string()).or_default();
            slot.current += slot.weight;
            total += slot.weight;
        }

        if total == 0 {
            // All zero-weight: eligible but never preferred. Fall back to
            // the first provider rather than failing the request.
            return Ok(Selection {
                record: eligible[0].clone(),
                reason: "all weights zero; defaulting to first eligible".to_string(),
            });
        }

        let mut best_index = 0;
        let mut best_current = i64::MIN;
        for (index, record) in eligible.iter().enumerate() {
            let current = slots.get(record.name()).expect("slot seeded above").current;
            if current > best_current {
                best_current = current;
                best_index = index;
            }
        }

        let chosen = eligible[best_index].clone();
        let slot = slots.get_mut(chosen.name()).expect("slot seeded above");
        slot.current -= total;
        let weight = slot.weight;

        Ok(Selection {
            record: chosen,
            reason: format!("smooth weighted share {weight}/{total}"),
        })
    }

    fn update_weights(&self, weights: &HashMap<String, u32>) {
        let mut slots = self.slots.lock().unwrap();
        for (name, weight) in weights {
            slots.entry(name.clone()).or_default().weight = *weight as i64;
        }
    }

    fn reset(&self) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.values_mut() {
            slot.current = 0;
        }
    }

    fn name(&self) -> &'static str {
        "weighted_round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::record;

    fn weights(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs
            .iter()
            .map(|(n, w)| (n.to_string(), *w))
            .collect()
    }

    #[test]
    fn schedule_is_weight_proportional() {
        let strategy =
            WeightedRoundRobin::new(weights(&[("p0", 1), ("p1", 2), ("p2", 3)]));
        let eligible = vec![record("p0", 1), record("p1", 2), record("p2", 3)];

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..6 {
            let pick = strategy.select(&eligible).unwrap();
            *counts.entry(pick.record.name().to_string()).or_default() += 1;
        }
        assert_eq!(counts["p0"], 1);
        assert_eq!(counts["p1"], 2);
        assert_eq!(counts["p2"], 3);
    }

    #[test]
    fn schedule_is_smooth_not_bursty() {
        // With weights {1,4} the heavy provider must never be picked five
        // times in a row within one period; the light one appears mid-period.
        let strategy = WeightedRoundRobin::new(weights(&[("light", 1), ("heavy", 4)]));
        let eligible = vec![record("light", 1), record("heavy", 4)];

        let picks: Vec<String> = (0..5)
            .map(|_| strategy.select(&eligible).unwrap().record.name().to_string())
            .collect();
        let light_position = picks.iter().position(|p| p == "light").unwrap();
        assert!(light_position > 0 && light_position < 4);
    }

    #[test]
    fn exact_counts_over_many_periods() {
        let strategy =
            WeightedRoundRobin::new(weights(&[("p0", 2), ("p1", 5), ("p2", 3)]));
        let eligible = vec![record("p0", 2), record("p1", 5), record("p2", 3)];

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..100 {
            let pick = strategy.select(&eligible).unwrap();
            *counts.entry(pick.record.name().to_string()).or_default() += 1;
        }
        assert_eq!(counts["p0"], 20);
        assert_eq!(counts["p1"], 50);
        assert_eq!(counts["p2"], 30);
    }

    #[test]
    fn zero_weight_starves_while_positive_exists() {
        let strategy = WeightedRoundRobin::new(weights(&[("idle", 0), ("busy", 2)]));
        let eligible = vec![record("idle", 0), record("busy", 2)];

        for _ in 0..10 {
            let pick = strategy.select(&eligible).unwrap();
            assert_eq!(pick.record.name(), "busy");
        }
    }

    #[test]
    fn all_zero_weights_fall_back_to_first() {
        let strategy = WeightedRoundRobin::new(weights(&[("a", 0), ("b", 0)]));
        let eligible = vec![record("a", 0), record("b", 0)];
        let pick = strategy.select(&eligible).unwrap();
        assert_eq!(pick.record.name(), "a");
    }

    #[test]
    fn unknown_providers_join_with_weight_one() {
        let strategy = WeightedRoundRobin::new(weights(&[("known", 3)]));
        let eligible = vec![record("known", 3), record("stranger", 1)];

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..8 {
            let pick = strategy.select(&eligible).unwrap();
            *counts.entry(pick.record.name().to_string()).or_default() += 1;
        }
        assert_eq!(counts["known"], 6);
        assert_eq!(counts["stranger"], 2);
    }

    #[test]
    fn update_weights_changes_the_schedule() {
        let strategy = WeightedRoundRobin::new(weights(&[("a", 1), ("b", 1)]));
        strategy.update_weights(&weights(&[("b", 3)]));
        let eligible = vec![record("a", 1), record("b", 3)];

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..8 {
            let pick = strategy.select(&eligible).unwrap();
            *counts.entry(pick.record.name().to_string()).or_default() += 1;
        }
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 6);
    }
}
