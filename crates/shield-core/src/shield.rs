//! The unified Shield facade.
//!
//! [`Shield`] owns one instance of every check and the governor, and
//! exposes them individually (the caller boundary) and chained together
//! as [`Shield::summarize`].

use std::future::Future;
use std::sync::Arc;

use shield_firewall::{
    InjectionFilter, OutputValidator, OutputViolation, SanitizationResult, StructuredPrompt,
    StructuredPromptBuilder, Url, UrlValidator, ValidationVerdict,
};
use shield_monitor::{
    estimate_tokens, ConsumptionGovernor, ConsumptionScope, GovernorStatus, RateLimiter,
};
use tracing::{debug, info, warn};

use crate::{
    config::ShieldConfig,
    error::ShieldError,
    verdict::{ReviewFlag, Verdict},
    Result,
};

/// Error type accepted from the fetch and LLM collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Token usage above this percentage raises [`ReviewFlag::HighTokenUsage`].
const HIGH_TOKEN_USAGE_PERCENT: u8 = 80;

/// The summarization security facade.
///
/// # Security Model
///
/// The pipeline is:
/// 1. URL validation (before any fetch)
/// 2. Sanitization of fetched content (fails open, flags recorded)
/// 3. Structured prompt assembly
/// 4. Governed LLM call (permit, rate slot, token budget, deadline)
/// 5. Output validation (fails closed, refusal substituted)
///
/// # Example
///
/// ```rust
/// use shield_core::{BoxError, Shield, ShieldConfig};
///
/// # async fn example() -> shield_core::Result<()> {
/// let shield = Shield::new(ShieldConfig::default())?;
///
/// let verdict = shield
///     .summarize(
///         "https://example.com/article",
///         "Summarize the article in two sentences.",
///         |_url| async { Ok::<_, BoxError>("Article text.".to_string()) },
///         |_prompt| async { Ok::<_, BoxError>("A short summary.".to_string()) },
///     )
///     .await?;
/// assert!(verdict.is_delivered());
/// # Ok(())
/// # }
/// ```
pub struct Shield {
    /// Configuration.
    config: ShieldConfig,

    /// SSRF gate.
    urls: UrlValidator,

    /// Prompt injection filter.
    filter: InjectionFilter,

    /// Prompt assembly.
    prompts: StructuredPromptBuilder,

    /// Output validation.
    output: OutputValidator,

    /// Concurrency, rate, tokens and deadline.
    governor: ConsumptionGovernor,
}

impl Shield {
    /// Create a Shield with its own rate limiter.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid
    /// - A built-in rule fails to compile
    pub fn new(config: ShieldConfig) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(
            config.governor.rate_limit_capacity,
            config.governor.rate_limit_window(),
        )?;
        Self::with_limiter(config, Arc::new(limiter))
    }

    /// Create a Shield drawing rate slots from a shared limiter.
    ///
    /// Use this when several facades call the same LLM backend. The
    /// limiter's own capacity and window apply; the config's rate values
    /// are ignored.
    pub fn with_limiter(config: ShieldConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        config.validate()?;

        let filter = InjectionFilter::with_config(config.filter_config())?;
        let output = OutputValidator::with_config(config.output_config())?;
        let governor = ConsumptionGovernor::new(config.governor_config(), limiter)?;

        info!(
            max_concurrent = config.governor.max_concurrent,
            max_tokens = config.governor.max_tokens_per_request,
            rules = filter.rule_count(),
            "shield initialized"
        );

        Ok(Self {
            config,
            urls: UrlValidator::new(),
            filter,
            prompts: StructuredPromptBuilder::new(),
            output,
            governor,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Check a URL before fetching it.
    pub fn validate_url(&self, url: &str) -> ValidationVerdict {
        let verdict = self.urls.validate(url);
        if !verdict.allowed {
            warn!(reason = %verdict.reason, "URL rejected");
        }
        verdict
    }

    /// Check a URL and return it parsed, or [`ShieldError::InvalidUrl`].
    pub fn check_url(&self, url: &str) -> Result<Url> {
        self.urls.check(url).map_err(|verdict| {
            warn!(reason = %verdict.reason, "URL rejected");
            ShieldError::InvalidUrl {
                url: url.to_string(),
                reason: verdict.reason,
            }
        })
    }

    /// Returns true if `text` contains an injection pattern.
    pub fn detect(&self, text: &str) -> bool {
        self.filter.detect(text)
    }

    /// Sanitize untrusted text to the configured length. Never fails;
    /// detections are logged by rule id.
    pub fn sanitize(&self, text: &str) -> SanitizationResult {
        let result = self.filter.sanitize_default(text);
        if result.injection_detected() {
            warn!(
                patterns = ?result.detected_pattern_ids,
                "prompt injection patterns removed"
            );
        }
        result
    }

    /// Assemble a structured prompt around pre-sanitized data.
    pub fn build_prompt(&self, system_instructions: &str, sanitized_data: &str) -> StructuredPrompt {
        self.prompts.build(system_instructions, sanitized_data)
    }

    /// Returns true if generated text passes every output check.
    pub fn validate_output(&self, text: &str) -> bool {
        self.output.validate(text)
    }

    /// First failing output check, if any.
    pub fn inspect_output(&self, text: &str) -> Option<OutputViolation> {
        self.output.inspect(text)
    }

    /// Generated text, or the refusal message if it fails a check.
    pub fn filter_output(&self, text: &str) -> String {
        self.output.filter(text)
    }

    /// Open a governed scope for a caller-driven LLM call.
    pub async fn enter_scope(&self) -> Result<ConsumptionScope> {
        Ok(self.governor.enter().await?)
    }

    /// The governor, for callers running their own operations.
    pub fn governor(&self) -> &ConsumptionGovernor {
        &self.governor
    }

    /// Current governor and limiter state.
    pub async fn status(&self) -> GovernorStatus {
        self.governor.status().await
    }

    /// Run the full pipeline for one URL.
    ///
    /// `fetch` is called only for an accepted URL. `invoke` receives the
    /// rendered structured prompt and runs inside a governed scope.
    ///
    /// # Returns
    ///
    /// - `Ok(Verdict::Delivered)` when the output passes validation
    /// - `Ok(Verdict::Refused)` when it does not
    /// - `Err` when the URL is rejected, a collaborator fails, admission
    ///   fails, or injection is found while `block_on_injection` is set
    pub async fn summarize<F, FFut, I, IFut>(
        &self,
        url: &str,
        instructions: &str,
        fetch: F,
        invoke: I,
    ) -> Result<Verdict>
    where
        F: FnOnce(Url) -> FFut,
        FFut: Future<Output = std::result::Result<String, BoxError>>,
        I: FnOnce(String) -> IFut,
        IFut: Future<Output = std::result::Result<String, BoxError>>,
    {
        // Phase 1: URL gate
        let url = self.check_url(url)?;
        let host = url.host_str().unwrap_or_default().to_string();
        debug!(%host, "fetching");

        // Phase 2: fetch and sanitize
        let raw = fetch(url)
            .await
            .map_err(|e| ShieldError::Fetch(e.to_string()))?;
        let sanitized = self.sanitize(&raw);

        let mut flags = Vec::new();
        if sanitized.injection_detected() {
            let pattern_ids: Vec<String> = sanitized.detected_pattern_ids.iter().cloned().collect();
            if self.config.firewall.block_on_injection {
                return Err(ShieldError::InjectionDetected { pattern_ids });
            }
            flags.push(ReviewFlag::InjectionDetected { pattern_ids });
        }
        if sanitized.truncated {
            flags.push(ReviewFlag::InputTruncated {
                max_length: self.config.firewall.max_sanitize_length,
            });
        }

        // Phase 3: prompt
        let prompt = self
            .build_prompt(instructions, &sanitized.sanitized_text)
            .into_text();

        // Phase 4: governed call
        let generated = {
            let mut scope = self.governor.enter().await?;
            scope.consume(estimate_tokens(&prompt))?;

            let generated = scope
                .within_deadline(invoke(prompt))
                .await?
                .map_err(|e| ShieldError::Generation(e.to_string()))?;
            scope.consume(estimate_tokens(&generated))?;

            let percentage = (scope.tokens_used() * 100 / scope.max_tokens()) as u8;
            if percentage > HIGH_TOKEN_USAGE_PERCENT {
                flags.push(ReviewFlag::HighTokenUsage { percentage });
            }
            generated
        };

        // Phase 5: output gate
        match self.output.inspect(&generated) {
            None => {
                info!(%host, flags = flags.len(), "summary delivered");
                Ok(Verdict::delivered(generated, flags))
            }
            Some(violation) => {
                warn!(%host, check = %violation.check, rule = %violation.rule_id, "summary refused");
                Ok(Verdict::refused(
                    violation,
                    self.config.output.refusal_message.clone(),
                ))
            }
        }
    }
}
