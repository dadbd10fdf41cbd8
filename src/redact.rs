// src/redact.rs
//! Credential detection and redaction.
//!
//! Used before logging user input, prompts and backend errors, and by the
//! security specialist to grade the text it is asked to audit.

use once_cell::sync::Lazy;
use regex::Regex;

// Google API keys, OpenAI-style secret keys, GitHub personal tokens, AWS access key ids
static RE_API_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(AIza[0-9A-Za-z_\-]{35}|sk-[A-Za-z0-9_\-]{20,}|ghp_[A-Za-z0-9]{36}|AKIA[0-9A-Z]{16})")
        .expect("valid regex")
});

static RE_SENSITIVE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Z0-9_]*(?:API_KEY|SECRET|PASSWORD|TOKEN|PWD))\s*[:=]\s*[^\s,;]+")
        .expect("valid regex")
});

static RE_BEARER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._\-]{16,}").expect("valid regex"));

pub const REDACTED_KEY: &str = "[REDACTED_API_KEY]";

/// What a scan found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretFindings {
    pub api_keys: usize,
    pub sensitive_pairs: usize,
    pub bearer_tokens: usize,
}

impl SecretFindings {
    pub fn total(&self) -> usize {
        self.api_keys + self.sensitive_pairs + self.bearer_tokens
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}

/// Replace every credential-looking fragment in `input`.
pub fn sanitize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let stage = RE_API_KEY.replace_all(input, REDACTED_KEY);
    let stage = RE_BEARER.replace_all(&stage, "Bearer [REDACTED]");
    RE_SENSITIVE_PAIR
        .replace_all(&stage, "${1}: [REDACTED]")
        .into_owned()
}

pub fn scan(input: &str) -> SecretFindings {
    SecretFindings {
        api_keys: RE_API_KEY.find_iter(input).count(),
        sensitive_pairs: RE_SENSITIVE_PAIR.find_iter(input).count(),
        bearer_tokens: RE_BEARER.find_iter(input).count(),
    }
}

/// Sanitized, length-capped rendering for log lines.
pub fn preview(input: &str, max_chars: usize) -> String {
    let clean = sanitize(input);
    if clean.chars().count() <= max_chars {
        return clean;
    }
    let mut cut: String = clean.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
