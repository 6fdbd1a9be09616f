//! Least-connections selection: pick the provider with the fewest calls in
//! flight. The counters live on the provider records and are maintained by
//! the orchestrator around every call (whatever strategy is active), so a
//! swap to this strategy mid-traffic sees accurate load immediately.

use crate::error::RouterError;
use crate::registry::ProviderRecord;
use crate::strategy::{Selection, SelectionStrategy};
use std::collections::HashMap;
use std::sync::Arc;

pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastConnections {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for LeastConnections {
    fn select(&self, eligible: &[Arc<ProviderRecord>]) -> Result<Selection, RouterError> {
        if eligible.is_empty() {
            return Err(RouterError::NoAvailableProvider);
        }

        let mut best_index = 0;
        let mut best_load = u64::MAX;
        for (index, record) in eligible.iter().enumerate() {
            let load = record.active_connections();
            if load < best_load {
                best_load = load;
                best_index = index;
            }
        }

        Ok(Selection {
            record: eligible[best_index].clone(),
            reason: format!("least connections ({best_load} in flight)"),
        })
    }

    fn update_weights(&self, _weights: &HashMap<String, u32>) {}

    fn reset(&self) {}

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::record;

    #[test]
    fn picks_the_least_loaded() {
        let strategy = LeastConnections::new();
        let a = record("a", 1);
        let b = record("b", 1);
        let c = record("c", 1);

        a.connection_opened();
        a.connection_opened();
        b.connection_opened();

        let eligible = vec![a.clone(), b.clone(), c.clone()];
        let pick = strategy.select(&eligible).unwrap();
        assert_eq!(pick.record.name(), "c");
    }

    #[test]
    fn ties_break_toward_insertion_order() {
        let strategy = LeastConnections::new();
        let eligible = vec![record("first", 1), record("second", 1)];
        let pick = strategy.select(&eligible).unwrap();
        assert_eq!(pick.record.name(), "first");
    }

    #[test]
    fn load_changes_redirect_selection() {
        let strategy = LeastConnections::new();
        let a = record("a", 1);
        let b = record("b", 1);
        let eligible = vec![a.clone(), b.clone()];

        a.connection_opened();
        assert_eq!(strategy.select(&eligible).unwrap().record.name(), "b");
        a.connection_closed();
        assert_eq!(strategy.select(&eligible).unwrap().record.name(), "a");
    }
}
