// src/backend/mod.rs
//! Reasoning backends and fallback-chain construction.
//!
//! A backend takes a prompt and returns text. Failures are classified as
//! [`BackendError`] so the resilience layer can rotate on rate limits.

mod diagnostics;
pub mod http;

pub use diagnostics::{ProviderDiagnostic, diagnostics};
pub use http::ChatCompletionsBackend;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::CoreConfig;
use crate::error::BackendError;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Provider name for logging/identification
    fn name(&self) -> &str;

    /// Whether credentials are present and not a placeholder
    fn is_configured(&self) -> bool;

    async fn invoke(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Ordered list of configured backends, preferred one first.
#[derive(Clone, Default)]
pub struct FallbackChain {
    backends: Vec<Arc<dyn Backend>>,
}

impl FallbackChain {
    /// Drop unconfigured backends and promote `preferred` to the front.
    /// Relative order of the rest is preserved.
    pub fn build(backends: Vec<Arc<dyn Backend>>, preferred: &str) -> Self {
        let mut configured: Vec<Arc<dyn Backend>> = backends
            .into_iter()
            .filter(|backend| {
                let ok = backend.is_configured();
                if !ok {
                    debug!("Skipping backend '{}': not configured", backend.name());
                }
                ok
            })
            .collect();

        if let Some(pos) = configured
            .iter()
            .position(|backend| backend.name().eq_ignore_ascii_case(preferred.trim()))
        {
            let chosen = configured.remove(pos);
            configured.insert(0, chosen);
        }

        Self {
            backends: configured,
        }
    }

    /// HTTP backends for every known provider, built from configuration.
    pub fn from_config(config: &CoreConfig) -> anyhow::Result<Self> {
        let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(config.providers.len());
        for settings in &config.providers {
            let backend = ChatCompletionsBackend::from_settings(settings, config.backend_timeout())?;
            if backend.is_configured() {
                debug!("Backend '{}' uses model '{}'", backend.name(), backend.model());
            }
            backends.push(Arc::new(backend));
        }
        Ok(Self::build(backends, &config.preferred_provider))
    }

    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
