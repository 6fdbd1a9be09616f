//! Round-robin selection: a monotonic atomic counter modulo the eligible
//! set size. Two selects issued in sequence on one task observe strictly
//! increasing counter values; concurrent selectors interleave without
//! coordination.

use crate::error::RouterError;
use crate::registry::ProviderRecord;
use crate::strategy::{Selection, SelectionStrategy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select(&self, eligible: &[Arc<ProviderRecord>]) -> Result<Selection, RouterError> {
        if eligible.is_empty() {
            return Err(RouterError::NoAvailableProvider);
        }
        let slot = self.counter.fetch_add(1, Ordering::Relaxed);
        let index = (slot % eligible.len() as u64) as usize;
        Ok(Selection {
            record: eligible[index].clone(),
            reason: format!("round-robin slot {index} of {}", eligible.len()),
        })
    }

    fn update_weights(&self, _weights: &HashMap<String, u32>) {}

    fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
