//! Consecutive-failure circuit breaker guarding remote calls.

use std::{
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicU8, AtomicU32, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call is let through.
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            break_duration: Duration::from_secs(30),
        }
    }
}

/// Closed until `failure_threshold` consecutive failures, then open for `break_duration`,
/// then half-open: a single trial call is let through, its success closes the circuit and its
/// failure opens it again. Other callers are refused while the trial is in flight.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    /// Whether a call may proceed. Moves an expired open circuit to half-open; only the caller
    /// that wins that transition is allowed through.
    pub fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => self.claim_trial(CircuitState::HalfOpen),
            CircuitState::Open => self.claim_trial(CircuitState::Open),
        }
    }

    /// Starts a trial once `break_duration` has passed since the circuit opened, or since the
    /// previous trial started without reporting back. The timestamp and state change together
    /// under the write lock.
    fn claim_trial(&self, from: CircuitState) -> bool {
        let mut since = self
            .opened_at
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let due = since
            .map(|started| started.elapsed() >= self.config.break_duration)
            .unwrap_or(true);
        if !due {
            return false;
        }
        let claimed = self
            .state
            .compare_exchange(
                from as u8,
                CircuitState::HalfOpen as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if claimed {
            *since = Some(Instant::now());
        }
        claimed
    }

    fn mark_now(&self) {
        *self
            .opened_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.state.store(CircuitState::Closed as u8, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let reopen = self.state() == CircuitState::HalfOpen;
        if reopen || count >= self.config.failure_threshold {
            self.mark_now();
            self.state.store(CircuitState::Open as u8, Ordering::SeqCst);
        }
    }
}
