//! Circuit breaker domain types
//!
//! State machine vocabulary, tuning profiles, and the failure classification
//! that decides which errors count toward opening the circuit.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without touching the guarded resource
    Open,
    /// Recovery probe in progress; a small number of trial calls decide
    /// the next transition
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker tuning
///
/// Injected explicitly so behavior is deterministic and testable; there is no
/// runtime environment sniffing. Pick a profile with [`production`] or
/// [`local`] and override fields with the builder methods where needed.
///
/// [`production`]: CircuitBreakerConfig::production
/// [`local`]: CircuitBreakerConfig::local
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Qualifying failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before a recovery probe
    pub open_timeout: Duration,
    /// Quiet period in the closed state after which the failure count
    /// restarts from scratch
    pub reset_timeout: Duration,
    /// Grace period for `allow_retry` callers while the circuit is open
    pub retry_grace: Duration,
    /// Successes required in half-open before closing
    pub success_threshold: u32,
    /// Count one out of every N resource-limit failures; 1 counts them all
    pub resource_limit_sample_rate: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl CircuitBreakerConfig {
    /// Strict profile for production traffic
    pub fn production() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(15),
            reset_timeout: Duration::from_secs(15),
            retry_grace: Duration::from_secs(5),
            success_threshold: 2,
            resource_limit_sample_rate: 1,
        }
    }

    /// Tolerant profile for local/interactive use, where benign
    /// connection-limit churn must not be mistaken for an outage
    pub fn local() -> Self {
        Self {
            failure_threshold: 15,
            open_timeout: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(15),
            retry_grace: Duration::from_secs(5),
            success_threshold: 2,
            resource_limit_sample_rate: 3,
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn with_retry_grace(mut self, grace: Duration) -> Self {
        self.retry_grace = grace;
        self
    }

    pub fn with_resource_limit_sample_rate(mut self, rate: u32) -> Self {
        self.resource_limit_sample_rate = rate.max(1);
        self
    }
}

/// How a failure is treated by the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Setup defect (bad credentials, missing role); never counted
    Configuration,
    /// Transient connectivity loss; always counted
    Connection,
    /// Too many concurrent clients and similar; counted, possibly sampled
    ResourceLimit,
    /// Everything else; not counted
    Unclassified,
}

impl FailureKind {
    /// Classify an error for failure accounting
    ///
    /// Structured variants decide directly. `Storage`/`Internal`/`Provider`
    /// errors that were not tagged at the origin fall back to a message
    /// substring heuristic.
    pub fn classify(error: &DomainError) -> Self {
        match error {
            DomainError::Configuration { .. } => Self::Configuration,
            DomainError::Connection { .. } => Self::Connection,
            DomainError::ResourceLimit { .. } => Self::ResourceLimit,
            DomainError::Storage { message }
            | DomainError::Internal { message }
            | DomainError::Provider { message, .. } => Self::classify_message(message),
            _ => Self::Unclassified,
        }
    }

    /// Substring fallback for errors whose origin did not tag them
    fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        let configuration = [
            "password authentication",
            "authentication failed",
            "invalid credential",
            "permission denied",
            "role",
            "tenant",
        ];
        if configuration.iter().any(|p| lower.contains(p)) {
            return Self::Configuration;
        }

        let resource_limit = [
            "too many clients",
            "too many connections",
            "connection limit",
            "max_connections",
        ];
        if resource_limit.iter().any(|p| lower.contains(p)) {
            return Self::ResourceLimit;
        }

        let connection = [
            "timeout",
            "timed out",
            "connection refused",
            "connection reset",
            "connection closed",
            "broken pipe",
            "econnrefused",
            "econnreset",
            "terminat",
            "shutdown",
        ];
        if connection.iter().any(|p| lower.contains(p)) {
            return Self::Connection;
        }

        Self::Unclassified
    }
}

/// Read-only view of the breaker for observability
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub seconds_since_last_failure: Option<u64>,
    pub is_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_profile() {
        let config = CircuitBreakerConfig::production();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.resource_limit_sample_rate, 1);
    }

    #[test]
    fn test_local_profile_is_tolerant() {
        let config = CircuitBreakerConfig::local();
        assert_eq!(config.failure_threshold, 15);
        assert_eq!(config.resource_limit_sample_rate, 3);
    }

    #[test]
    fn test_sample_rate_never_zero() {
        let config = CircuitBreakerConfig::production().with_resource_limit_sample_rate(0);
        assert_eq!(config.resource_limit_sample_rate, 1);
    }

    #[test]
    fn test_classify_tagged_variants() {
        assert_eq!(
            FailureKind::classify(&DomainError::configuration("missing role")),
            FailureKind::Configuration
        );
        assert_eq!(
            FailureKind::classify(&DomainError::connection("reset by peer")),
            FailureKind::Connection
        );
        assert_eq!(
            FailureKind::classify(&DomainError::resource_limit("too many clients")),
            FailureKind::ResourceLimit
        );
    }

    #[test]
    fn test_classify_untagged_falls_back_to_message() {
        assert_eq!(
            FailureKind::classify(&DomainError::storage("connection refused")),
            FailureKind::Connection
        );
        assert_eq!(
            FailureKind::classify(&DomainError::storage(
                "FATAL: sorry, too many clients already"
            )),
            FailureKind::ResourceLimit
        );
        assert_eq!(
            FailureKind::classify(&DomainError::storage(
                "password authentication failed for user"
            )),
            FailureKind::Configuration
        );
    }

    #[test]
    fn test_classify_unknown_is_unclassified() {
        assert_eq!(
            FailureKind::classify(&DomainError::storage("syntax error at or near")),
            FailureKind::Unclassified
        );
        assert_eq!(
            FailureKind::classify(&DomainError::validation("bad input")),
            FailureKind::Unclassified
        );
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }
}
