//! # Core Types for the Firewall
//!
//! Data types shared by the input-side and output-side checks: injection
//! categories, per-call sanitization results, URL verdicts, output
//! violations and the crate error type.
//!
//! ## Design Principles
//!
//! 1. **Call-scoped** - every result is produced per call and owned by the caller
//! 2. **Explicit outcomes** - validation failures are values, never panics
//! 3. **Serializable** - results derive Serde traits for logging and audit trails
//!
//! ## References
//!
//! - OWASP LLM Top 10: <https://owasp.org/www-project-top-10-for-large-language-model-applications/>
//! - OWASP SSRF Prevention Cheat Sheet:
//!   <https://cheatsheetseries.owasp.org/cheatsheets/Server_Side_Request_Forgery_Prevention_Cheat_Sheet.html>

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Family of injection technique a detection rule targets.
///
/// | Variant | Example phrase |
/// |---------|----------------|
/// | `InstructionOverride` | "ignore all previous instructions" |
/// | `RoleOverride` | "you are now in developer mode" |
/// | `PromptExtraction` | "reveal your system instructions" |
/// | `ResetRequest` | "forget everything", "disregard the rules" |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternCategory {
    /// Attempts to cancel or replace the controlling instructions.
    InstructionOverride,

    /// Attempts to switch the model into another persona or mode.
    RoleOverride,

    /// Attempts to make the model disclose its hidden instructions.
    PromptExtraction,

    /// Attempts to wipe the model's prior context or rule set.
    ResetRequest,
}

impl PatternCategory {
    /// Returns the OWASP LLM Top 10 category this technique maps to.
    pub fn owasp_category(&self) -> &'static str {
        match self {
            Self::PromptExtraction => "LLM07: System Prompt Leakage",
            _ => "LLM01: Prompt Injection",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstructionOverride => write!(f, "instruction-override"),
            Self::RoleOverride => write!(f, "role-override"),
            Self::PromptExtraction => write!(f, "prompt-extraction"),
            Self::ResetRequest => write!(f, "reset-request"),
        }
    }
}

/// A single rule match inside scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Identifier of the rule that matched.
    pub rule_id: String,
    /// Category of the rule that matched.
    pub category: PatternCategory,
    /// Byte range of the match in the scanned text.
    pub span: Range<usize>,
    /// True when the match was only visible after unscrambling
    /// character-transposed words.
    pub obfuscated: bool,
}

/// Outcome of [`InjectionFilter::sanitize`](crate::InjectionFilter::sanitize).
///
/// `sanitized_text` never exceeds the requested maximum length in
/// characters. `detected_pattern_ids` is the set of rule ids that matched,
/// reported for observability even though sanitization itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationResult {
    /// Cleaned, bounded text safe to place in a data block.
    pub sanitized_text: String,
    /// Ids of every rule that matched.
    pub detected_pattern_ids: BTreeSet<String>,
    /// True when the text was cut to fit the maximum length.
    pub truncated: bool,
}

impl SanitizationResult {
    /// Returns true when at least one injection rule matched.
    #[inline]
    pub fn injection_detected(&self) -> bool {
        !self.detected_pattern_ids.is_empty()
    }
}

/// Why a URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlReason {
    /// Scheme other than `http` or `https`.
    BadScheme,
    /// Host is loopback, unspecified, private or otherwise internal.
    BlockedHost,
    /// URL could not be parsed or has no network location.
    Malformed,
    /// The URL was accepted.
    None,
}

impl fmt::Display for UrlReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadScheme => write!(f, "scheme not allowed"),
            Self::BlockedHost => write!(f, "host is internal or private"),
            Self::Malformed => write!(f, "malformed URL"),
            Self::None => write!(f, "accepted"),
        }
    }
}

/// Outcome of [`UrlValidator::validate`](crate::UrlValidator::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the URL may be fetched.
    pub allowed: bool,
    /// Rejection reason, or [`UrlReason::None`] when allowed.
    pub reason: UrlReason,
}

impl ValidationVerdict {
    /// An accepting verdict.
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: UrlReason::None,
        }
    }

    /// A rejecting verdict with the given reason.
    pub const fn reject(reason: UrlReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Which output check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputCheck {
    /// Output longer than the configured maximum.
    Length,
    /// Credential-shaped token (API key, bearer token, `KEY=value`).
    Credential,
    /// Echo of hidden instructions or the system prompt.
    PromptLeak,
    /// Absolute home-directory path or dotenv-style filename.
    PathLeak,
}

impl fmt::Display for OutputCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "length"),
            Self::Credential => write!(f, "credential"),
            Self::PromptLeak => write!(f, "prompt-leak"),
            Self::PathLeak => write!(f, "path-leak"),
        }
    }
}

/// First check that failed on a piece of generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputViolation {
    /// The failing check.
    pub check: OutputCheck,
    /// Rule id within the check (`"max_length"` for [`OutputCheck::Length`]).
    pub rule_id: String,
}

impl fmt::Display for OutputViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.check, self.rule_id)
    }
}

/// Errors raised while building firewall components.
///
/// Runtime checks never fail; only rule compilation can.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// A detection rule did not compile.
    #[error("rule '{id}' failed to compile: {source}")]
    InvalidRule {
        /// Id of the offending rule
        id: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },
}

/// Result type alias for firewall construction.
pub type Result<T> = std::result::Result<T, FirewallError>;
