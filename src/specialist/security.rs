// src/specialist/security.rs
// Security specialist: audits the request text for exposed credentials.

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

use super::{SECURITY_TOPIC, Specialist};
use crate::bus::Message;
use crate::redact::{self, SecretFindings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Raw keys are worst; named secrets and bearer tokens are next.
    pub fn assess(findings: &SecretFindings) -> Self {
        if findings.api_keys > 0 {
            RiskLevel::High
        } else if findings.sensitive_pairs > 0 || findings.bearer_tokens > 0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Default)]
pub struct SecuritySpecialist;

impl SecuritySpecialist {
    pub fn new() -> Self {
        Self
    }

    pub fn audit(text: &str) -> String {
        let findings = redact::scan(text);
        let risk = RiskLevel::assess(&findings);

        let mut out = format!("Risk level: {}\n", risk);
        out.push_str(&format!(
            "Findings: {} API key(s), {} sensitive key/value pair(s), {} bearer token(s)\n",
            findings.api_keys, findings.sensitive_pairs, findings.bearer_tokens
        ));
        if findings.is_clean() {
            out.push_str("No credentials detected in the request.");
        } else {
            out.push_str("Rotate any exposed credential. Redacted text:\n");
            out.push_str(&redact::preview(text, 400));
        }
        out
    }
}

#[async_trait]
impl Specialist for SecuritySpecialist {
    fn topic(&self) -> &str {
        SECURITY_TOPIC
    }

    fn description(&self) -> &str {
        "Credential exposure and vulnerability triage"
    }

    async fn perform(&self, request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        let text = if request.payload.is_empty() {
            request.task_description.clone()
        } else {
            format!("{}\n{}", request.task_description, request.payload)
        };
        Ok(Self::audit(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_flags_api_key_as_high() {
        let report = SecuritySpecialist::audit("is this safe? sk-abcdefghijklmnopqrstuvwxyz123");
        assert!(report.starts_with("Risk level: HIGH"));
        assert!(!report.contains("sk-abcdef"));
    }

    #[test]
    fn test_audit_clean_text_is_low() {
        let report = SecuritySpecialist::audit("check the security of the login form");
        assert!(report.starts_with("Risk level: LOW"));
        assert!(report.contains("No credentials detected"));
    }

    #[test]
    fn test_named_secret_is_medium() {
        let findings = redact::scan("DB_PASSWORD=hunter2");
        assert_eq!(RiskLevel::assess(&findings), RiskLevel::Medium);
    }
}
