//! # Circuit Breaker
//!
//! Failure-counting guard placed in front of every cross-service call.
//!
//! ## States
//!
//! - **Closed**: calls pass through; consecutive failures are counted.
//! - **Open**: calls are refused without touching the network until the
//!   cooldown has elapsed.
//! - **HalfOpen**: a bounded number of trial calls is let through. One
//!   success per admitted trial closes the breaker, any failure re-opens it.
//!
//! The breaker never reads the clock. Callers pass `now` to every method,
//! which keeps the state machine deterministic under test. Each change of
//! state bumps a generation counter; outcomes reported for a permit issued in
//! an earlier generation are ignored so a slow call cannot flip a breaker that
//! has already moved on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default number of consecutive failures that opens the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default time the breaker stays open before admitting a trial call.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Default number of trial calls admitted while half-open.
pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 1;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker from Closed to Open.
    pub failure_threshold: u32,
    /// How long the breaker stays Open before going HalfOpen.
    pub cooldown: Duration,
    /// Trial calls admitted while HalfOpen (and successes needed to close).
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
            half_open_max_calls: DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}

impl BreakerConfig {
    /// Set the failure threshold (clamped to at least 1).
    #[must_use]
    pub const fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = if threshold == 0 { 1 } else { threshold };
        self
    }

    /// Set the Open-state cooldown.
    #[must_use]
    pub const fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the number of half-open trial calls (clamped to at least 1).
    #[must_use]
    pub const fn half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = if calls == 0 { 1 } else { calls };
        self
    }
}

// =============================================================================
// STATE AND OUTCOMES
// =============================================================================

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// How a call ended, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Classify an HTTP response status.
    ///
    /// Only 5xx counts as a failure. A 4xx means the remote service is
    /// healthy and answered; it just refused this particular request.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 && status < 600 {
            Self::Failure
        } else {
            Self::Success
        }
    }
}

/// A change of breaker state, reported back so the caller can log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Proof that a call was admitted. Hand it back to [`CircuitBreaker::record`].
#[derive(Debug)]
#[must_use = "report the call outcome with CircuitBreaker::record"]
pub struct Permit {
    generation: u64,
}

/// The breaker refused the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Time until a trial call may be admitted (zero when half-open and saturated).
    pub retry_after: Duration,
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub rejected_calls: u64,
}

// =============================================================================
// CIRCUIT BREAKER
// =============================================================================

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_admitted: u32,
    opened_at: Option<Instant>,
    rejected_calls: u64,
}

impl Inner {
    fn enter(&mut self, to: BreakerState, now: Instant) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.half_open_admitted = 0;
        self.opened_at = (to == BreakerState::Open).then_some(now);
        Some(Transition { from, to })
    }

    /// Move Open -> HalfOpen once the cooldown has passed.
    fn refresh(&mut self, config: &BreakerConfig, now: Instant) -> Option<Transition> {
        match (self.state, self.opened_at) {
            (BreakerState::Open, Some(opened))
                if now.saturating_duration_since(opened) >= config.cooldown =>
            {
                self.enter(BreakerState::HalfOpen, now)
            }
            _ => None,
        }
    }
}

/// Thread-safe circuit breaker guarding one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_admitted: 0,
                opened_at: None,
                rejected_calls: 0,
            }),
        }
    }

    /// The configuration this breaker was built with.
    #[must_use]
    pub const fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave Inner half-updated:
        // every mutation is a plain field store.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state as of `now`.
    pub fn state(&self, now: Instant) -> BreakerState {
        let mut inner = self.lock();
        inner.refresh(&self.config, now);
        inner.state
    }

    /// Snapshot for health reporting.
    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        let mut inner = self.lock();
        inner.refresh(&self.config, now);
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            rejected_calls: inner.rejected_calls,
        }
    }

    /// Ask to make a call.
    ///
    /// Returns the permit plus any transition the clock caused (Open ->
    /// HalfOpen), or [`Rejected`] when the call must fail fast.
    pub fn try_acquire(&self, now: Instant) -> Result<(Permit, Option<Transition>), Rejected> {
        let mut inner = self.lock();
        let transition = inner.refresh(&self.config, now);

        match inner.state {
            BreakerState::Closed => {}
            BreakerState::Open => {
                inner.rejected_calls = inner.rejected_calls.saturating_add(1);
                let elapsed = inner
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened))
                    .unwrap_or_default();
                return Err(Rejected {
                    retry_after: self.config.cooldown.saturating_sub(elapsed),
                });
            }
            BreakerState::HalfOpen => {
                if inner.half_open_admitted >= self.config.half_open_max_calls {
                    inner.rejected_calls = inner.rejected_calls.saturating_add(1);
                    return Err(Rejected {
                        retry_after: Duration::ZERO,
                    });
                }
                inner.half_open_admitted = inner.half_open_admitted.saturating_add(1);
            }
        }

        Ok((
            Permit {
                generation: inner.generation,
            },
            transition,
        ))
    }

    /// Report how an admitted call ended.
    ///
    /// Returns the resulting transition, if any.
    pub fn record(&self, permit: Permit, outcome: Outcome, now: Instant) -> Option<Transition> {
        let mut inner = self.lock();
        inner.refresh(&self.config, now);

        if permit.generation != inner.generation {
            return None;
        }

        match (inner.state, outcome) {
            (BreakerState::Closed, Outcome::Success) => {
                inner.consecutive_failures = 0;
                None
            }
            (BreakerState::Closed, Outcome::Failure) => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.enter(BreakerState::Open, now)
                } else {
                    None
                }
            }
            (BreakerState::HalfOpen, Outcome::Success) => {
                inner.consecutive_successes = inner.consecutive_successes.saturating_add(1);
                if inner.consecutive_successes >= self.config.half_open_max_calls {
                    inner.enter(BreakerState::Closed, now)
                } else {
                    None
                }
            }
            (BreakerState::HalfOpen, Outcome::Failure) => inner.enter(BreakerState::Open, now),
            // A permit cannot be issued while Open; the generation check above covers it.
            (BreakerState::Open, _) => None,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn fail(breaker: &CircuitBreaker, now: Instant) -> Option<Transition> {
        let (permit, _) = breaker.try_acquire(now).expect("admitted");
        breaker.record(permit, Outcome::Failure, now)
    }

    #[test]
    fn status_classification() {
        assert_eq!(Outcome::from_status(200), Outcome::Success);
        assert_eq!(Outcome::from_status(201), Outcome::Success);
        assert_eq!(Outcome::from_status(403), Outcome::Success);
        assert_eq!(Outcome::from_status(404), Outcome::Success);
        assert_eq!(Outcome::from_status(499), Outcome::Success);
        assert_eq!(Outcome::from_status(500), Outcome::Failure);
        assert_eq!(Outcome::from_status(503), Outcome::Failure);
    }

    #[test]
    fn opens_after_threshold() {
        let breaker = CircuitBreaker::default();
        let t0 = Instant::now();

        assert!(fail(&breaker, t0).is_none());
        assert!(fail(&breaker, t0).is_none());
        let transition = fail(&breaker, t0).expect("third failure trips");
        assert_eq!(transition.from, BreakerState::Closed);
        assert_eq!(transition.to, BreakerState::Open);

        let rejected = breaker.try_acquire(t0 + Duration::from_secs(1)).unwrap_err();
        assert_eq!(rejected.retry_after, Duration::from_secs(9));
        assert_eq!(breaker.snapshot(t0).rejected_calls, 1);
    }

    #[test]
    fn success_resets_failure_streak() {
        let breaker = CircuitBreaker::default();
        let t0 = Instant::now();

        fail(&breaker, t0);
        fail(&breaker, t0);
        let (permit, _) = breaker.try_acquire(t0).unwrap();
        breaker.record(permit, Outcome::Success, t0);
        fail(&breaker, t0);
        fail(&breaker, t0);

        assert_eq!(breaker.state(t0), BreakerState::Closed);
    }

    #[test]
    fn half_open_trial_success_closes() {
        let breaker = CircuitBreaker::default();
        let t0 = Instant::now();
        for _ in 0..3 {
            fail(&breaker, t0);
        }

        let later = t0 + DEFAULT_COOLDOWN;
        let (permit, transition) = breaker.try_acquire(later).expect("trial admitted");
        assert_eq!(
            transition,
            Some(Transition {
                from: BreakerState::Open,
                to: BreakerState::HalfOpen
            })
        );
        // Only one trial at a time
        assert!(breaker.try_acquire(later).is_err());

        let closed = breaker.record(permit, Outcome::Success, later);
        assert_eq!(closed.map(|t| t.to), Some(BreakerState::Closed));
        assert!(breaker.try_acquire(later).is_ok());
    }

    #[test]
    fn half_open_trial_failure_reopens() {
        let breaker = CircuitBreaker::default();
        let t0 = Instant::now();
        for _ in 0..3 {
            fail(&breaker, t0);
        }

        let later = t0 + DEFAULT_COOLDOWN + Duration::from_millis(1);
        let transition = fail(&breaker, later).expect("reopens");
        assert_eq!(transition.to, BreakerState::Open);
        // The cooldown restarts from the failed trial
        assert!(breaker.try_acquire(later + Duration::from_secs(5)).is_err());
        assert!(breaker.try_acquire(later + DEFAULT_COOLDOWN).is_ok());
    }

    #[test]
    fn stale_permit_is_ignored() {
        let breaker = CircuitBreaker::default();
        let t0 = Instant::now();

        let (slow, _) = breaker.try_acquire(t0).unwrap();
        for _ in 0..3 {
            fail(&breaker, t0);
        }
        let later = t0 + DEFAULT_COOLDOWN;
        assert_eq!(breaker.state(later), BreakerState::HalfOpen);

        // The slow call from the closed generation must not close the breaker
        assert!(breaker.record(slow, Outcome::Success, later).is_none());
        assert_eq!(breaker.state(later), BreakerState::HalfOpen);
    }

    #[test]
    fn zero_thresholds_are_clamped() {
        let config = BreakerConfig::default()
            .failure_threshold(0)
            .half_open_max_calls(0);
        assert_eq!(config.failure_threshold, 1);
        assert_eq!(config.half_open_max_calls, 1);
    }
}
