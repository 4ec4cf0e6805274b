//! Circuit breaker guarding the durable store
//!
//! One instance per guarded connection pool. All state lives behind a single
//! mutex, so concurrent callers observe transitions atomically; in
//! particular only one caller can perform the open-to-half-open move and
//! initiate the recovery probe.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::breaker::{BreakerSnapshot, CircuitBreakerConfig, CircuitState, FailureKind};
use crate::domain::DomainError;

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    resource_limit_seen: u32,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            resource_limit_seen: 0,
        }
    }
}

/// Three-state guard for operations against a failing-prone resource
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether calls should currently be rejected
    ///
    /// In the open state this also performs the open-to-half-open
    /// transition once the open timeout has elapsed; the decision happens
    /// under the lock so exactly one caller starts the recovery probe.
    /// With `allow_retry`, a caller gets one attempt through a formally
    /// open circuit once the grace period since the last failure has
    /// passed; no transition happens on that path.
    pub fn is_open(&self, allow_retry: bool) -> bool {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed = match inner.last_failure_at {
                    Some(at) => at.elapsed(),
                    // Open without a recorded failure cannot happen through
                    // the public API; recover rather than wedge shut
                    None => {
                        self.transition(&mut inner, CircuitState::HalfOpen);
                        return false;
                    }
                };

                if elapsed >= self.config.open_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    debug!(
                        elapsed_secs = elapsed.as_secs(),
                        "circuit probing recovery"
                    );
                    return false;
                }

                if allow_retry && elapsed >= self.config.retry_grace {
                    debug!("circuit open, allowing grace retry");
                    return false;
                }

                true
            }
        }
    }

    /// Run `operation` under the breaker
    ///
    /// Rejects with [`DomainError::CircuitOpen`] without touching the
    /// resource when the circuit is open; otherwise invokes the operation,
    /// records the outcome, and passes the result through unchanged.
    pub async fn guard<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        self.guard_inner(operation, false, f).await
    }

    /// Like [`guard`], but with the grace-period escape hatch for
    /// latency-sensitive critical operations
    ///
    /// [`guard`]: CircuitBreaker::guard
    pub async fn guard_with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        self.guard_inner(operation, true, f).await
    }

    async fn guard_inner<T, F, Fut>(
        &self,
        operation: &str,
        allow_retry: bool,
        f: F,
    ) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        if self.is_open(allow_retry) {
            let (state, since) = {
                let inner = self.lock();
                let since = inner
                    .last_failure_at
                    .map(|at| at.elapsed().as_secs())
                    .unwrap_or(0);
                (inner.state, since)
            };

            warn!(operation, state = state.as_str(), "circuit open, rejecting call");
            return Err(DomainError::circuit_open(state.as_str(), since));
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;

                if inner.success_count >= self.config.success_threshold {
                    inner.failure_count = 0;
                    inner.last_failure_at = None;
                    self.transition(&mut inner, CircuitState::Closed);
                    info!("circuit closed after successful recovery probe");
                }
            }
            CircuitState::Closed => {
                if inner.failure_count > 0 {
                    inner.failure_count = 0;
                }
            }
            // A grace retry can succeed while formally open; the probe
            // still has to go through half-open
            CircuitState::Open => {}
        }
    }

    /// Classify and record a failed call
    pub fn record_failure(&self, error: &DomainError) {
        match FailureKind::classify(error) {
            FailureKind::Configuration => {
                warn!(%error, "configuration error, not counted toward circuit");
                return;
            }
            FailureKind::Unclassified => {
                debug!(%error, "unclassified error, not counted toward circuit");
                return;
            }
            FailureKind::ResourceLimit => {
                let mut inner = self.lock();
                inner.resource_limit_seen += 1;

                if inner.resource_limit_seen % self.config.resource_limit_sample_rate != 0 {
                    debug!(
                        seen = inner.resource_limit_seen,
                        "resource-limit error sampled out"
                    );
                    return;
                }

                self.count_failure(&mut inner);
            }
            FailureKind::Connection => {
                let mut inner = self.lock();
                self.count_failure(&mut inner);
            }
        }
    }

    fn count_failure(&self, inner: &mut BreakerInner) {
        let now = Instant::now();

        // Stale failures in the closed state are forgotten after a quiet
        // period; the count restarts with this failure
        if inner.state == CircuitState::Closed {
            if let Some(last) = inner.last_failure_at {
                if last.elapsed() >= self.config.reset_timeout {
                    inner.failure_count = 0;
                }
            }
        }

        inner.failure_count += 1;
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(inner, CircuitState::Open);
                warn!("recovery probe failed, circuit reopened");
            }
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(inner, CircuitState::Open);
                    warn!(
                        failures = inner.failure_count,
                        "failure threshold reached, circuit opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Transition helper; success_count resets on every move into or out
    /// of half-open
    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.success_count = 0;

        debug!(from = from.as_str(), to = to.as_str(), "circuit state change");
    }

    /// Read-only view for observability; no side effects
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let seconds_since_last_failure = inner.last_failure_at.map(|at| at.elapsed().as_secs());

        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            seconds_since_last_failure,
            is_open: inner.state == CircuitState::Open,
        }
    }

    /// Manual operational reset back to closed
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = BreakerInner::new();

        info!("circuit manually reset");
    }
}
