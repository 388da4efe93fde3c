//! Error types for admission control and consumption governance.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Where a governed operation was when its deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Still waiting for a concurrency permit.
    AwaitingPermit,
    /// Holding a permit and running the wrapped operation.
    Running,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingPermit => write!(f, "awaiting permit"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Errors raised by the rate limiter and the consumption governor.
///
/// # Security Notes
///
/// Every variant is raised before or instead of the guarded work, never
/// after it silently ran past a limit.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Waiting for a rate-limit slot exceeded the allowed wait.
    #[error("rate limit slot not available within {waited:?}")]
    RateLimitTimeout {
        /// How long the caller was willing to wait
        waited: Duration,
    },

    /// The governed operation exceeded its deadline.
    ///
    /// The operation was cancelled and its permit released.
    #[error("operation timed out after {timeout:?} while {phase}")]
    ConcurrencyTimeout {
        /// Phase the operation was in
        phase: TimeoutPhase,
        /// Configured timeout
        timeout: Duration,
    },

    /// Estimated token usage exceeds the per-request budget.
    #[error("token budget exceeded: {required} tokens required, only {available} available")]
    TokenBudgetExceeded {
        /// Tokens the operation needs
        required: u64,
        /// Tokens left in the budget
        available: u64,
    },

    /// The governor was shut down.
    #[error("consumption governor is closed")]
    Closed,

    /// Invalid limiter or governor configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    /// Returns true for transient failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitTimeout { .. } | Self::ConcurrencyTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MonitorError::RateLimitTimeout {
            waited: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(MonitorError::ConcurrencyTimeout {
            phase: TimeoutPhase::Running,
            timeout: Duration::from_secs(30),
        }
        .is_retryable());
        assert!(!MonitorError::TokenBudgetExceeded {
            required: 10,
            available: 5
        }
        .is_retryable());
        assert!(!MonitorError::Closed.is_retryable());
    }

    #[test]
    fn test_timeout_message_names_phase() {
        let err = MonitorError::ConcurrencyTimeout {
            phase: TimeoutPhase::AwaitingPermit,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "operation timed out after 5s while awaiting permit");
    }
}
