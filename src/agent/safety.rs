//! Fail-closed safety validators: input jailbreak/toxicity screening and
//! output PII screening (§4.7)
//!
//! Neither validator logs the text it inspects — only length metrics — and
//! neither treats an internal validator error as "safe": a validator that
//! cannot render a verdict is fail-closed.

use crate::config::SafetyConfig;
use regex::Regex;
use tracing::warn;

/// Outcome of a safety check: flagged or not, plus an optional
/// user-facing refusal reason (never the inspected content).
#[derive(Debug, Clone)]
pub struct Verdict {
    pub flagged: bool,
    pub reason: Option<String>,
}

impl Verdict {
    fn safe() -> Self {
        Self {
            flagged: false,
            reason: None,
        }
    }

    fn flagged(reason: impl Into<String>) -> Self {
        Self {
            flagged: true,
            reason: Some(reason.into()),
        }
    }
}

/// A safety validator over arbitrary text. `check` must never panic: any
/// internal failure is surfaced as `Err`, and callers are required to
/// treat `Err` as flagged (fail-closed).
pub trait SafetyValidator: Send + Sync {
    fn check(&self, text: &str) -> std::result::Result<Verdict, String>;

    /// Fail-closed wrapper: an `Err` from `check` becomes a flagged
    /// verdict instead of propagating, per §4.7.
    fn check_fail_closed(&self, text: &str) -> Verdict {
        match self.check(text) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, text_len = text.len(), "validator error, failing closed");
                Verdict::flagged("validator unavailable")
            }
        }
    }
}

/// Jailbreak / toxicity screening of user input. A production deployment
/// would swap in a model-backed validator (the `device` config field is
/// carried for that purpose); this implementation screens for common
/// prompt-injection phrasings via regex, the same pattern-matching idiom
/// the output guard already uses for PII.
pub struct InputGuard {
    /// Carried from config for a future model-backed validator; the
    /// regex matcher below is a binary presence check, not a scored one.
    #[allow(dead_code)]
    threshold: f32,
    patterns: Vec<Regex>,
}

impl InputGuard {
    pub fn new(config: &SafetyConfig) -> Self {
        let patterns = [
            r"(?i)ignore (all |any )?(previous|prior|above) instructions",
            r"(?i)you are now (in )?(developer|DAN|jailbreak) mode",
            r"(?i)disregard (your|all) (safety|content) (guidelines|policy|policies)",
            r"(?i)pretend (you have no|there are no) restrictions",
            r"(?i)act as if you have no rules",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        Self {
            threshold: config.input_guard_threshold,
            patterns,
        }
    }
}

impl SafetyValidator for InputGuard {
    fn check(&self, text: &str) -> std::result::Result<Verdict, String> {
        if text.trim().is_empty() {
            return Ok(Verdict::safe());
        }

        let flagged = self.patterns.iter().any(|re| re.is_match(text));

        if flagged {
            return Ok(Verdict::flagged(
                "Jailbreak attempt detected. Your request contains content that violates security policies.",
            ));
        }

        Ok(Verdict::safe())
    }
}

/// PII screening of generated output across the entity set named in
/// `config.pii_entities` (EMAIL, PHONE, CREDIT_CARD, SSN, PASSPORT,
/// DRIVER_LICENSE, IBAN, IP).
pub struct OutputGuard {
    entity_patterns: Vec<(String, Regex)>,
}

impl OutputGuard {
    pub fn new(config: &SafetyConfig) -> Self {
        let all_patterns: &[(&str, &str)] = &[
            ("EMAIL", r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b"),
            ("PHONE", r"\b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b"),
            ("CREDIT_CARD", r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
            ("SSN", r"\b\d{3}-\d{2}-\d{4}\b"),
            ("PASSPORT", r"(?i)\b[A-Z]{1,2}\d{6,9}\b"),
            ("DRIVER_LICENSE", r"(?i)\b[A-Z]\d{7,12}\b"),
            ("IBAN", r"(?i)\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b"),
            ("IP", r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
        ];

        let entity_patterns = all_patterns
            .iter()
            .filter(|(name, _)| config.pii_entities.iter().any(|e| e == name))
            .filter_map(|(name, pattern)| {
                Regex::new(pattern).ok().map(|re| (name.to_string(), re))
            })
            .collect();

        Self { entity_patterns }
    }
}

impl SafetyValidator for OutputGuard {
    fn check(&self, text: &str) -> std::result::Result<Verdict, String> {
        if text.trim().is_empty() {
            return Ok(Verdict::safe());
        }

        for (_, pattern) in &self.entity_patterns {
            if pattern.is_match(text) {
                return Ok(Verdict::flagged(
                    "PII detected in generated response. The information requested is classified or not free to know.",
                ));
            }
        }

        Ok(Verdict::safe())
    }
}
