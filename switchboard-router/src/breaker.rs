//! # Circuit Breaker
//!
//! Per-provider availability gate. Repeated call failures open the breaker,
//! which removes the provider from the eligible set; after a cooldown a
//! limited number of half-open probe calls decide whether the provider
//! returns to rotation or goes back to the penalty box.
//!
//! ## State machine
//!
//! - **Closed** — normal operation. Failures accumulate in a window;
//!   successes leak one failure back out. At `failure_threshold` the
//!   breaker opens and stamps `opened_at`.
//! - **Open** — selections are rejected until `opened_at + open_cooldown`.
//!   The transition to half-open happens lazily at selection time, inside
//!   [`CircuitBreaker::acquire`], not on a timer.
//! - **HalfOpen** — at most `half_open_max_probes` calls are admitted. A
//!   success closes the breaker and clears the window; a failure re-opens
//!   it and restarts the cooldown.
//!
//! Eligibility filtering uses the non-consuming [`CircuitBreaker::admits`];
//! the orchestrator claims an actual admission with `acquire` only for the
//! provider the strategy chose, so probe capacity is never burned on
//! providers that merely appeared in the eligible snapshot. Admission
//! decisions and state transitions share one lock, so a breaker can never
//! admit more probes than configured even under concurrent selection.
//! Health probes never touch the breaker: call-time failures are the only
//! signal that trips it.

use crate::config::BreakerConfig;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Instant;

/// Circuit breaker operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation, requests admitted
    Closed,
    /// Failure threshold reached, requests rejected
    Open,
    /// Cooldown elapsed, limited probe requests admitted
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures_in_window: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    config: BreakerConfig,
}

impl BreakerInner {
    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.opened_at {
            Some(opened_at) => now.duration_since(opened_at) >= self.config.open_cooldown,
            // Open without a timestamp cannot happen through the public
            // API; stay rejecting rather than guess.
            None => false,
        }
    }
}

/// Point-in-time view of a breaker, for admin endpoints and logs.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failures_in_window: u32,
    /// Milliseconds since the breaker last opened, if it ever did
    pub open_for_ms: Option<u64>,
}

/// Per-provider circuit breaker.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures_in_window: 0,
                opened_at: None,
                half_open_in_flight: 0,
                config,
            }),
        }
    }

    /// Non-consuming eligibility check at time `now`.
    ///
    /// True when a call *could* be admitted: closed, open with the cooldown
    /// elapsed, or half-open with probe capacity left. Never transitions
    /// state and never claims probe capacity.
    pub fn admits(&self, now: Instant) -> bool {
        let inner = self.inner.lock().unwrap();
        if !inner.config.enabled {
            return true;
        }
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => inner.cooldown_elapsed(now),
            BreakerState::HalfOpen => {
                inner.half_open_in_flight < inner.config.half_open_max_probes
            }
        }
    }

    /// Claim an admission for an imminent call.
    ///
    /// Open breakers whose cooldown has elapsed transition to half-open
    /// here and hand the caller the first probe slot. Returns `false` when
    /// a concurrent selection claimed the last slot between the
    /// eligibility snapshot and this call.
    pub fn acquire(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.config.enabled {
            return true;
        }
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if inner.cooldown_elapsed(now) {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    tracing::info!("circuit breaker transitioning to half-open");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight < inner.config.half_open_max_probes {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    ///
    /// In the closed state one failure leaks out of the window per success;
    /// in the half-open state the breaker closes and the window clears.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.config.enabled {
            return;
        }
        match inner.state {
            BreakerState::Closed => {
                inner.failures_in_window = inner.failures_in_window.saturating_sub(1);
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Closed;
                inner.failures_in_window = 0;
                inner.half_open_in_flight = 0;
                inner.opened_at = None;
                tracing::info!("circuit breaker closed after successful probe");
            }
            BreakerState::Open => {
                // A call admitted before the breaker opened finished late.
                // The open verdict stands until the cooldown runs its course.
            }
        }
    }

    /// Record a call failure that counts toward the breaker window.
    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.config.enabled {
            return;
        }
        match inner.state {
            BreakerState::Closed => {
                inner.failures_in_window += 1;
                if inner.failures_in_window >= inner.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    tracing::warn!(
                        failures = inner.failures_in_window,
                        "circuit breaker opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.half_open_in_flight = 0;
                tracing::warn!("circuit breaker re-opened after failed probe");
            }
            BreakerState::Open => {
                inner.opened_at.get_or_insert(now);
            }
        }
    }

    /// Release a claimed admission whose outcome counts neither as success
    /// nor failure (permanent upstream answers, caller cancellation), so a
    /// half-open probe slot is not leaked.
    pub fn release(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.config.enabled {
            return;
        }
        if inner.state == BreakerState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Manual administrative reset to the closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = BreakerState::Closed;
        inner.failures_in_window = 0;
        inner.half_open_in_flight = 0;
        inner.opened_at = None;
        tracing::info!("circuit breaker manually reset");
    }

    /// Swap in new parameters; state and counters are preserved.
    pub fn update_config(&self, config: BreakerConfig) {
        self.inner.lock().unwrap().config = config;
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().unwrap();
        BreakerSnapshot {
            state: inner.state,
            failures_in_window: inner.failures_in_window,
            open_for_ms: inner.opened_at.map(|t| t.elapsed().as_millis() as u64),
        }
    }
}
