// src/backend/diagnostics.rs
// Provider readiness report (credential present, placeholder, preferred)

use serde::Serialize;

use crate::config::{CoreConfig, is_placeholder, is_valid_secret};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDiagnostic {
    pub provider: String,
    pub source_key: String,
    pub configured: bool,
    pub ready: bool,
    pub preferred: bool,
    pub notes: String,
}

/// One entry per known provider, in configuration order.
pub fn diagnostics(config: &CoreConfig) -> Vec<ProviderDiagnostic> {
    config
        .providers
        .iter()
        .map(|settings| {
            let preferred = settings.spec.id == config.preferred_provider;
            let configured = is_valid_secret(&settings.api_key);

            let notes = if preferred {
                if configured {
                    "Preferred provider configured."
                } else {
                    "Preferred provider invalid/missing key."
                }
            } else if settings.api_key.trim().is_empty() {
                "Missing secret."
            } else if is_placeholder(&settings.api_key) {
                "Placeholder secret detected."
            } else {
                "Credential loaded."
            };

            ProviderDiagnostic {
                provider: settings.spec.display.to_string(),
                source_key: settings.spec.key_var.to_string(),
                configured,
                ready: configured,
                preferred,
                notes: notes.to_string(),
            }
        })
        .collect()
}
