//! Per-host circuit breaker: Closed/Open/HalfOpen with exponential backoff.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_TRIP_THRESHOLD: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(10);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    current_backoff: Duration,
    trip_threshold: u32,
    half_open_trial_dispatched: bool,
}

/// One breaker per host. `Send + Sync` via an internal `Mutex`; cheap enough
/// to call on every probe result without contention across hosts (one
/// breaker instance per host, never shared).
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_trip_threshold(DEFAULT_TRIP_THRESHOLD)
    }

    pub fn with_trip_threshold(trip_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                current_backoff: INITIAL_BACKOFF,
                trip_threshold,
                half_open_trial_dispatched: false,
            }),
        }
    }

    /// Whether a call is currently allowed. `HalfOpen` permits exactly one
    /// trial call: the first caller to observe `HalfOpen` (including the
    /// caller whose check causes the Open->HalfOpen transition) gets `true`
    /// and marks the trial dispatched; every other concurrent caller sees
    /// `false` until `record_success`/`record_failure` resolves the trial.
    pub fn is_call_permitted(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_trial_dispatched {
                    false
                } else {
                    inner.half_open_trial_dispatched = true;
                    true
                }
            }
            CircuitState::Open => {
                let elapsed_since_open = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed_since_open >= inner.current_backoff {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_trial_dispatched = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
        inner.current_backoff = INITIAL_BACKOFF;
        inner.opened_at = None;
        inner.half_open_trial_dispatched = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.current_backoff = (inner.current_backoff * 2).min(MAX_BACKOFF);
                inner.half_open_trial_dispatched = false;
            }
            CircuitState::Closed if inner.consecutive_failures >= inner.trip_threshold => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.current_backoff = INITIAL_BACKOFF;
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_trip_threshold() {
        let breaker = CircuitBreaker::with_trip_threshold(5);
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_call_permitted());
    }

    #[test]
    fn trips_open_at_threshold() {
        let breaker = CircuitBreaker::with_trip_threshold(3);
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_call_permitted());
    }

    #[test]
    fn success_resets_consecutive_failures_and_closes() {
        let breaker = CircuitBreaker::with_trip_threshold(3);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_failure_reopens_and_doubles_backoff() {
        let breaker = CircuitBreaker::with_trip_threshold(1);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        {
            let mut inner = breaker.inner.lock().unwrap();
            inner.opened_at = Some(Instant::now() - Duration::from_secs(20));
        }
        assert!(breaker.is_call_permitted());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.inner.lock().unwrap().current_backoff, Duration::from_secs(20));
    }
}
