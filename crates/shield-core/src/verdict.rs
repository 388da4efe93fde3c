//! Verdict types for summarization results.

use serde::{Deserialize, Serialize};

use shield_firewall::OutputViolation;

use crate::{error::ShieldError, Result};

/// The final outcome of a governed summarization.
///
/// - `Delivered`: output passed validation and may be shown, possibly with
///   flags raised on the input side
/// - `Refused`: output failed validation and was replaced by the refusal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Output passed every check.
    Delivered {
        /// The generated summary.
        summary: String,
        /// Observations that did not stop processing.
        flags: Vec<ReviewFlag>,
    },

    /// Output failed validation. Never carries the generated text.
    Refused {
        /// First failing check.
        violation: OutputViolation,
        /// Text to show instead.
        refusal: String,
    },
}

impl Verdict {
    /// Create a Delivered verdict.
    pub fn delivered(summary: String, flags: Vec<ReviewFlag>) -> Self {
        Self::Delivered { summary, flags }
    }

    /// Create a Refused verdict.
    pub fn refused(violation: OutputViolation, refusal: String) -> Self {
        Self::Refused { violation, refusal }
    }

    /// Returns true if the summary was delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Returns true if the output was refused.
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }

    /// Returns true if delivered with at least one flag.
    pub fn requires_review(&self) -> bool {
        matches!(self, Self::Delivered { flags, .. } if !flags.is_empty())
    }

    /// Text safe to show: the summary or the refusal.
    pub fn text(&self) -> &str {
        match self {
            Self::Delivered { summary, .. } => summary,
            Self::Refused { refusal, .. } => refusal,
        }
    }

    /// Flags raised during processing (empty when refused).
    pub fn flags(&self) -> &[ReviewFlag] {
        match self {
            Self::Delivered { flags, .. } => flags,
            Self::Refused { .. } => &[],
        }
    }

    /// Converts a refusal into [`ShieldError::OutputRejected`].
    pub fn into_result(self) -> Result<String> {
        match self {
            Self::Delivered { summary, .. } => Ok(summary),
            Self::Refused { violation, .. } => Err(ShieldError::OutputRejected { violation }),
        }
    }
}

/// Observations recorded while processing continued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReviewFlag {
    /// Injection patterns found and replaced in the fetched content.
    InjectionDetected {
        /// Matched rule ids.
        pattern_ids: Vec<String>,
    },

    /// Fetched content exceeded the sanitize limit and was cut.
    InputTruncated {
        /// Limit in characters.
        max_length: usize,
    },

    /// Token usage is high but within budget.
    HighTokenUsage {
        /// Percentage of the budget used.
        percentage: u8,
    },
}

impl std::fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InjectionDetected { pattern_ids } => {
                write!(f, "Injection patterns removed: {}", pattern_ids.join(", "))
            }
            Self::InputTruncated { max_length } => {
                write!(f, "Input truncated to {} characters", max_length)
            }
            Self::HighTokenUsage { percentage } => {
                write!(f, "High token usage: {}%", percentage)
            }
        }
    }
}
