// src/specialist/coder.rs
// Code specialist: hands the task to a dedicated backend when one is wired,
// otherwise answers with a structural reading of the request.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CODER_TOPIC, Specialist};
use crate::backend::Backend;
use crate::bus::Message;
use crate::redact;

static RE_FILE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[\w.-]+/)*[\w-]+\.(?:rs|py|cs|ts|tsx|js|go|java|kt|cpp|c|h|toml|json|ya?ml|md)\b")
        .expect("valid regex")
});

// Backticked spans, CamelCase types and snake_case names
static RE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`([^`]+)`|\b([A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+)\b|\b([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\b")
        .expect("valid regex")
});

const CODER_INSTRUCTIONS: &str = "You are a senior software engineer. Answer the task below with \
concrete code changes, keeping explanations short. Never repeat credentials.";

pub struct CodeSpecialist {
    backend: Option<Arc<dyn Backend>>,
}

impl CodeSpecialist {
    pub fn new(backend: Option<Arc<dyn Backend>>) -> Self {
        Self { backend }
    }

    /// Identifiers and file paths mentioned in `task`, sorted and de-duplicated.
    pub fn analyze(task: &str) -> (Vec<String>, Vec<String>) {
        let paths: BTreeSet<String> = RE_FILE_PATH
            .find_iter(task)
            .map(|m| m.as_str().to_string())
            .collect();

        let identifiers: BTreeSet<String> = RE_IDENTIFIER
            .captures_iter(task)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|ident| !ident.is_empty() && !paths.contains(ident))
            .collect();

        (identifiers.into_iter().collect(), paths.into_iter().collect())
    }

    fn structural_summary(task: &str) -> String {
        let (identifiers, paths) = Self::analyze(task);
        let mut out = String::from("Structural reading of the request (no code backend wired).\n");

        if paths.is_empty() {
            out.push_str("Files: none mentioned\n");
        } else {
            out.push_str(&format!("Files: {}\n", paths.join(", ")));
        }
        if identifiers.is_empty() {
            out.push_str("Identifiers: none mentioned\n");
        } else {
            out.push_str(&format!("Identifiers: {}\n", identifiers.join(", ")));
        }
        out.push_str(&format!("Task: {}", redact::preview(task, 200)));
        out
    }
}

#[async_trait]
impl Specialist for CodeSpecialist {
    fn topic(&self) -> &str {
        CODER_TOPIC
    }

    fn description(&self) -> &str {
        "Code changes, refactors and code review"
    }

    async fn perform(&self, request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        let task = redact::sanitize(&request.task_description);
        match &self.backend {
            Some(backend) => {
                debug!("[coder] forwarding to backend '{}'", backend.name());
                let prompt = format!("{}\n\nTASK:\n{}", CODER_INSTRUCTIONS, task);
                Ok(backend.invoke(&prompt).await?)
            }
            None => Ok(Self::structural_summary(&task)),
        }
    }
}
