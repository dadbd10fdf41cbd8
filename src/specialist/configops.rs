// src/specialist/configops.rs
// Configuration specialist: reports which backends are usable.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{CONFIGOPS_TOPIC, Specialist};
use crate::backend::{ProviderDiagnostic, diagnostics};
use crate::bus::Message;
use crate::config::CoreConfig;

pub struct ConfigOpsSpecialist {
    config: Arc<CoreConfig>,
}

impl ConfigOpsSpecialist {
    pub fn new(config: Arc<CoreConfig>) -> Self {
        Self { config }
    }

    pub fn render(preferred: &str, report: &[ProviderDiagnostic]) -> String {
        let ready = report.iter().filter(|d| d.ready).count();
        let mut out = format!(
            "Preferred provider: {}\nReady providers: {}/{}",
            preferred,
            ready,
            report.len()
        );
        for diag in report {
            out.push_str(&format!(
                "\n- {} ({}): {}{}",
                diag.provider,
                diag.source_key,
                if diag.ready { "ready" } else { "not ready" },
                if diag.notes.is_empty() {
                    String::new()
                } else {
                    format!(". {}", diag.notes)
                }
            ));
        }
        if ready == 0 {
            out.push_str("\nNo backend is usable: set at least one API key.");
        }
        out
    }
}

#[async_trait]
impl Specialist for ConfigOpsSpecialist {
    fn topic(&self) -> &str {
        CONFIGOPS_TOPIC
    }

    fn description(&self) -> &str {
        "Provider and API key diagnostics"
    }

    async fn perform(&self, _request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        let report = diagnostics(&self.config);
        Ok(Self::render(&self.config.preferred_provider, &report))
    }
}
