//! Injection rule table.
//!
//! Static catalogue of detection rules, evaluated in order by
//! [`InjectionFilter`](crate::InjectionFilter). Each entry carries a stable
//! id used in logs and [`SanitizationResult`](crate::SanitizationResult)s, a
//! [`PatternCategory`], and a regex compiled when the filter is built.
//!
//! New rules are added here, not in the filter's control flow.

use crate::models::PatternCategory;

/// A single detection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionRule {
    /// Short, snake_case identifier.
    pub id: &'static str,
    /// Technique family.
    pub category: PatternCategory,
    /// Case-insensitive regex source.
    pub pattern: &'static str,
}

/// The built-in rule table.
pub static INJECTION_RULES: &[InjectionRule] = &[
    // ---- Instruction override ------------------------------------------
    InjectionRule {
        id: "ignore_instructions",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)\bignore\s+(?:(?:all|any|the|your|my|of|these|those)\s+)*(?:(?:previous|prior|above|earlier|preceding|original|system)\s+)?(?:instructions?|prompts?|directions?|directives?)\b",
    },
    InjectionRule {
        id: "bypass_rules",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)\b(?:override|bypass|circumvent)\s+(?:(?:all|any|the|your)\s+)*(?:(?:previous|system|safety|security|content)\s+)?(?:instructions?|rules|guidelines|restrictions|filters?)\b",
    },
    InjectionRule {
        id: "system_override",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)\bsystem\s*:?\s*override\b",
    },
    InjectionRule {
        id: "new_instructions",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)\bnew\s+(?:system\s+)?instructions?\s*:",
    },
    InjectionRule {
        id: "do_not_follow",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)\bdo\s+not\s+follow\s+(?:any|the|your)\s+(?:previous|above|prior|original)\b",
    },
    // ---- Role override -------------------------------------------------
    InjectionRule {
        id: "mode_switch",
        category: PatternCategory::RoleOverride,
        pattern: r"(?i)\byou\s+are\s+now\s+(?:in\s+)?(?:an?\s+)?[\w-]+(?:\s+[\w-]+)?\s+mode\b",
    },
    InjectionRule {
        id: "enable_mode",
        category: PatternCategory::RoleOverride,
        pattern: r"(?i)\b(?:enable|activate|enter)\s+(?:developer|debug|god|jailbreak|dan|unrestricted)\s+mode\b",
    },
    InjectionRule {
        id: "act_unrestricted",
        category: PatternCategory::RoleOverride,
        pattern: r"(?i)\b(?:pretend|act|roleplay)\s+(?:to\s+be\s+|as\s+if\s+you\s+(?:are|were)\s+|as\s+|that\s+you\s+are\s+)(?:an?\s+)?(?:unrestricted|unfiltered|uncensored|jailbroken)\b",
    },
    InjectionRule {
        id: "do_anything_now",
        category: PatternCategory::RoleOverride,
        pattern: r"(?i)\bdo\s+anything\s+now\b",
    },
    // ---- Prompt extraction ---------------------------------------------
    InjectionRule {
        id: "reveal_instructions",
        category: PatternCategory::PromptExtraction,
        pattern: r"(?i)\b(?:reveal|show|display|print|output|repeat|disclose|leak)\s+(?:me\s+)?(?:(?:all|of)\s+)?(?:your|the)\s+(?:(?:system|hidden|initial|original|secret|internal|full)\s+)*(?:instructions?|prompts?)\b",
    },
    InjectionRule {
        id: "query_instructions",
        category: PatternCategory::PromptExtraction,
        pattern: r"(?i)\bwhat\s+(?:are|were|is)\s+your\s+(?:(?:system|initial|original|hidden)\s+)?(?:instructions?|prompt|rules)\b",
    },
    InjectionRule {
        id: "repeat_above",
        category: PatternCategory::PromptExtraction,
        pattern: r"(?i)\brepeat\s+(?:everything|all|the\s+text|the\s+words)\s+(?:above|before\s+this)\b",
    },
    // ---- Reset requests ------------------------------------------------
    InjectionRule {
        id: "forget_everything",
        category: PatternCategory::ResetRequest,
        pattern: r"(?i)\bforget\s+(?:everything|all\s+(?:of\s+)?(?:(?:your|the|previous|prior)\s+)*(?:instructions?|rules|context|training))\b",
    },
    InjectionRule {
        id: "disregard_rules",
        category: PatternCategory::ResetRequest,
        pattern: r"(?i)\bdisregard\s+(?:(?:all|any|the|your|my|of|these)\s+)*(?:(?:previous|prior|above|earlier|original|system|safety)\s+)?(?:instructions?|rules|guidelines|prompts?|directives?)\b",
    },
    InjectionRule {
        id: "start_over",
        category: PatternCategory::ResetRequest,
        pattern: r"(?i)\bstart\s+(?:over|fresh)\s+with\s+(?:new|no)\s+(?:instructions|rules)\b",
    },
];

/// Words whose character-transposed spellings are unscrambled before the
/// rule table is re-run (typoglycemia defense).
pub static OBFUSCATION_KEYWORDS: &[&str] = &[
    "ignore",
    "previous",
    "instruction",
    "instructions",
    "reveal",
    "system",
    "prompt",
    "disregard",
    "forget",
    "everything",
    "override",
    "bypass",
    "developer",
    "rules",
    "guidelines",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_rules_compile() {
        for rule in INJECTION_RULES {
            regex::Regex::new(rule.pattern)
                .unwrap_or_else(|e| panic!("rule '{}' failed to compile: {e}", rule.id));
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for rule in INJECTION_RULES {
            assert!(seen.insert(rule.id), "duplicate rule id: {}", rule.id);
        }
    }

    #[test]
    fn every_category_is_covered() {
        for category in [
            PatternCategory::InstructionOverride,
            PatternCategory::RoleOverride,
            PatternCategory::PromptExtraction,
            PatternCategory::ResetRequest,
        ] {
            assert!(INJECTION_RULES.iter().any(|r| r.category == category));
        }
    }

    #[test]
    fn keywords_are_lowercase_ascii() {
        for kw in OBFUSCATION_KEYWORDS {
            assert!(kw.len() > 3);
            assert!(kw.bytes().all(|b| b.is_ascii_lowercase()));
        }
    }
}
