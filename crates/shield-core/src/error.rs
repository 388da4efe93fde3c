//! Error types for the summarization shield.

use thiserror::Error;

use shield_firewall::{FirewallError, OutputViolation, UrlReason};
use shield_monitor::MonitorError;

/// Core error type for shield operations.
///
/// Rate, concurrency and token failures arrive through
/// [`ShieldError::Monitor`]; use [`is_retryable`](Self::is_retryable) to
/// decide between retrying and surfacing the failure.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// URL rejected before fetching.
    #[error("URL rejected ({reason}): {url}")]
    InvalidUrl {
        /// The rejected URL as given.
        url: String,
        /// Why it was rejected.
        reason: UrlReason,
    },

    /// Injection detected while `block_on_injection` is set.
    #[error("prompt injection detected: {}", pattern_ids.join(", "))]
    InjectionDetected {
        /// Matched rule ids.
        pattern_ids: Vec<String>,
    },

    /// Generated output failed validation.
    #[error("output rejected: {violation}")]
    OutputRejected {
        /// First failing check.
        violation: OutputViolation,
    },

    /// Admission control passthrough.
    #[error("admission failed: {0}")]
    Monitor(#[from] MonitorError),

    /// Firewall construction passthrough.
    #[error("firewall error: {0}")]
    Firewall(#[from] FirewallError),

    /// The fetch collaborator failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The LLM collaborator failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ShieldError {
    /// Returns true for transient admission failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Monitor(err) => err.is_retryable(),
            _ => false,
        }
    }
}
