//! Configuration types for the summarization shield.
//!
//! Values only. Every field has a default, so a TOML file needs to name
//! just the settings it changes:
//!
//! ```toml
//! [governor]
//! rate_limit_capacity = 30
//! max_concurrent = 2
//!
//! [output]
//! refusal_message = "Summary unavailable."
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use shield_firewall::{
    FilterConfig, OutputConfig, DEFAULT_MARKER, DEFAULT_MAX_LENGTH, DEFAULT_MAX_OUTPUT_LENGTH,
    DEFAULT_REFUSAL,
};
use shield_monitor::{GovernorConfig, DEFAULT_MAX_TOKENS};

use crate::{error::ShieldError, Result};

/// Configuration for the [`Shield`](crate::Shield) facade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Input-side filtering.
    pub firewall: FirewallSettings,

    /// Output-side validation.
    pub output: OutputSettings,

    /// Rate limiting and consumption governance.
    pub governor: GovernorSettings,
}

/// Input-side filtering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallSettings {
    /// Maximum sanitized text length in characters.
    pub max_sanitize_length: usize,

    /// Marker substituted for matched injection spans.
    pub marker: String,

    /// Character runs longer than this collapse to one character.
    pub repetition_limit: usize,

    /// Catch character-transposed keywords.
    pub detect_obfuscation: bool,

    /// Stop the pipeline on detected injection instead of sanitizing
    /// and continuing.
    pub block_on_injection: bool,
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            max_sanitize_length: DEFAULT_MAX_LENGTH,
            marker: DEFAULT_MARKER.to_string(),
            repetition_limit: 3,
            detect_obfuscation: true,
            block_on_injection: false,
        }
    }
}

/// Output-side validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Maximum generated text length in characters.
    pub max_output_length: usize,

    /// Text returned in place of rejected output.
    pub refusal_message: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            refusal_message: DEFAULT_REFUSAL.to_string(),
        }
    }
}

/// Rate limiting and governance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    /// Admissions per window.
    pub rate_limit_capacity: usize,

    /// Sliding window length in seconds.
    pub rate_limit_window_seconds: u64,

    /// Longest wait for a rate slot; unset waits indefinitely.
    pub rate_limit_max_wait_seconds: Option<u64>,

    /// Maximum simultaneously open scopes.
    pub max_concurrent: usize,

    /// Token budget per request.
    pub max_tokens_per_request: u64,

    /// Deadline for permit acquisition and for the LLM call.
    pub timeout_seconds: u64,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            rate_limit_capacity: 60,
            rate_limit_window_seconds: 60,
            rate_limit_max_wait_seconds: None,
            max_concurrent: 4,
            max_tokens_per_request: DEFAULT_MAX_TOKENS,
            timeout_seconds: 60,
        }
    }
}

impl GovernorSettings {
    /// Sliding window length.
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }
}

impl ShieldConfig {
    /// Load a TOML configuration file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShieldError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ShieldError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would disable a limit outright.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.firewall.max_sanitize_length == 0, "firewall.max_sanitize_length"),
            (self.firewall.repetition_limit == 0, "firewall.repetition_limit"),
            (self.output.max_output_length == 0, "output.max_output_length"),
            (self.governor.rate_limit_capacity == 0, "governor.rate_limit_capacity"),
            (self.governor.rate_limit_window_seconds == 0, "governor.rate_limit_window_seconds"),
            (self.governor.rate_limit_max_wait_seconds == Some(0), "governor.rate_limit_max_wait_seconds"),
            (self.governor.max_concurrent == 0, "governor.max_concurrent"),
            (self.governor.max_tokens_per_request == 0, "governor.max_tokens_per_request"),
            (self.governor.timeout_seconds == 0, "governor.timeout_seconds"),
        ];

        match checks.iter().find(|(invalid, _)| *invalid) {
            Some((_, field)) => Err(ShieldError::Config(format!("{field} must be greater than zero"))),
            None => Ok(()),
        }
    }

    /// Injection filter settings.
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            max_length: self.firewall.max_sanitize_length,
            marker: self.firewall.marker.clone(),
            repetition_limit: self.firewall.repetition_limit,
            detect_obfuscation: self.firewall.detect_obfuscation,
        }
    }

    /// Output validator settings.
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            max_output_length: self.output.max_output_length,
            refusal_message: self.output.refusal_message.clone(),
        }
    }

    /// Governor settings.
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig::new()
            .with_max_concurrent(self.governor.max_concurrent)
            .with_max_tokens(self.governor.max_tokens_per_request)
            .with_timeout(Duration::from_secs(self.governor.timeout_seconds))
            .with_rate_limit_max_wait(self.governor.rate_limit_max_wait_seconds.map(Duration::from_secs))
    }
}
