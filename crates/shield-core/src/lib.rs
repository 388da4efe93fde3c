//! # Shield Core
//!
//! Security facade for LLM summarization of untrusted web content.
//! Orchestrates the firewall checks and the consumption governor.
//!
//! ## Threat Coverage
//!
//! | Layer | Component | Threats Blocked |
//! |-------|-----------|-----------------|
//! | Fetch | URL validator | SSRF to loopback, private and link-local hosts |
//! | Input | Injection filter | Indirect prompt injection, obfuscated variants |
//! | Prompt | Structured builder | Data read as instructions, delimiter forgery |
//! | Admission | Consumption governor | Quota exhaustion, cost blow-up, pile-up |
//! | Output | Output validator | Credential, system prompt and path leakage |
//!
//! ## Architecture
//!
//! ```text
//! URL ──► UrlValidator ──► fetch ──► InjectionFilter ──► StructuredPromptBuilder
//!                                                                │
//!            Verdict ◄── OutputValidator ◄── invoke ◄── ConsumptionGovernor
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shield_core::{Shield, ShieldConfig, Verdict};
//!
//! let shield = Shield::new(ShieldConfig::load("shield.toml")?)?;
//!
//! match shield.summarize(url, "Summarize in three bullets.", fetch, invoke).await? {
//!     Verdict::Delivered { summary, flags } => show(summary, flags),
//!     Verdict::Refused { refusal, .. } => show(refusal, vec![]),
//! }
//! ```
//!
//! ## Security Notes
//!
//! - Checks execute in order: URL → Sanitize → Prompt → Governor → Output
//! - The input side fails open: injected spans are replaced and processing
//!   continues, unless `block_on_injection` is set
//! - The output side fails closed: one failing check replaces the whole
//!   output with the refusal message
//! - DNS rebinding is not covered; the URL check is purely syntactic
//!
//! ## References
//!
//! - OWASP LLM Prompt Injection Prevention Cheat Sheet
//! - OWASP LLM Top 10: LLM01 Prompt Injection, LLM02 Sensitive Information
//!   Disclosure, LLM10 Unbounded Consumption

mod config;
mod error;
mod shield;
mod verdict;

pub use config::{FirewallSettings, GovernorSettings, OutputSettings, ShieldConfig};
pub use error::ShieldError;
pub use shield::{BoxError, Shield};
pub use verdict::{ReviewFlag, Verdict};

// Re-export component types for convenience
pub use shield_firewall::{
    OutputCheck, OutputViolation, SanitizationResult, StructuredPrompt, Url, UrlReason,
    ValidationVerdict,
};
pub use shield_monitor::{
    ConsumptionGovernor, ConsumptionScope, GovernorStatus, MonitorError, RateLimiter,
    RateLimiterStats,
};

/// Core result type for shield operations.
pub type Result<T> = std::result::Result<T, ShieldError>;
