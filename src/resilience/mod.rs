// src/resilience/mod.rs
//! Invocation of the backend fallback chain.
//!
//! Sequential mode walks the chain in order:
//! - `RateLimited` rotates to the next backend when auto-fallback is on,
//!   and propagates otherwise
//! - any other failure moves on, unless it came from the last backend
//! - a chain that ends rate limited yields [`EXHAUSTED_SENTINEL`]
//!
//! Racing mode calls every backend at once and keeps the first success.
//! The losing calls are dropped, which cancels them.
//!
//! An empty chain never errors: it yields [`NO_BACKEND_SENTINEL`].
//!
//! A backend that answers `RateLimited` sits out a cooldown. While rotation
//! applies (auto-fallback on, or racing) cooling backends are skipped; when
//! every backend is cooling the call yields [`EXHAUSTED_SENTINEL`] without
//! touching any of them.

pub mod hooks;

pub use hooks::{PostProcessReport, PostProcessor};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::{Backend, FallbackChain};
use crate::config::CoreConfig;
use crate::error::BackendError;
use crate::redact;

pub const NO_BACKEND_SENTINEL: &str = "No reasoning backend is configured. \
Set an API key (for example GEMINI_API_KEY) and try again.";

pub const EXHAUSTED_SENTINEL: &str = "Every reasoning backend is rate limited right now, \
so I am temporarily out of action. Please try again in a few minutes.";

/// How long a rate-limited backend is skipped.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeMode {
    Sequential,
    /// Needs at least two backends; otherwise behaves as sequential
    Racing,
}

impl InvokeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvokeMode::Sequential => "sequential",
            InvokeMode::Racing => "racing",
        }
    }
}

pub struct ResilienceInvoker {
    chain: FallbackChain,
    auto_fallback: bool,
    mode: InvokeMode,
    hooks: PostProcessor,
    cooldown: Duration,
    // backend name -> end of its cooldown
    cooling: Mutex<HashMap<String, Instant>>,
}

impl ResilienceInvoker {
    pub fn new(chain: FallbackChain) -> Self {
        Self {
            chain,
            auto_fallback: false,
            mode: InvokeMode::Sequential,
            hooks: PostProcessor::default(),
            cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            cooling: Mutex::new(HashMap::new()),
        }
    }

    /// Chain mode and fallback flags as configured.
    pub fn from_config(chain: FallbackChain, config: &CoreConfig) -> Self {
        let mode = if config.simultaneous {
            InvokeMode::Racing
        } else {
            InvokeMode::Sequential
        };
        Self::new(chain)
            .with_auto_fallback(config.auto_fallback)
            .with_mode(mode)
            .with_cooldown(config.rate_limit_cooldown())
    }

    pub fn with_auto_fallback(mut self, enabled: bool) -> Self {
        self.auto_fallback = enabled;
        self
    }

    pub fn with_mode(mut self, mode: InvokeMode) -> Self {
        self.mode = mode;
        self
    }

    /// `Duration::ZERO` disables cooldowns.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_post_processor(mut self, hooks: PostProcessor) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Mode actually used for the current chain.
    pub fn effective_mode(&self) -> InvokeMode {
        match self.mode {
            InvokeMode::Racing if self.chain.len() >= 2 => InvokeMode::Racing,
            _ => InvokeMode::Sequential,
        }
    }

    /// Names of backends currently sitting out a rate-limit cooldown, sorted.
    pub fn cooling_backends(&self) -> Vec<String> {
        let now = Instant::now();
        let mut cooling = self.cooling.lock();
        cooling.retain(|_, until| *until > now);
        let mut names: Vec<String> = cooling.keys().cloned().collect();
        names.sort();
        names
    }

    fn mark_rate_limited(&self, backend: &str) {
        if self.cooldown.is_zero() {
            return;
        }
        self.cooling
            .lock()
            .insert(backend.to_string(), Instant::now() + self.cooldown);
        info!("Backend '{}' cooling down for {:?}", backend, self.cooldown);
    }

    /// Backends eligible for this call, in chain order. Empty only when
    /// every backend is cooling down.
    fn candidates(&self) -> Vec<Arc<dyn Backend>> {
        let backends = self.chain.backends();
        // Without rotation the preferred backend is always tried
        if !self.auto_fallback && self.effective_mode() == InvokeMode::Sequential {
            return backends.to_vec();
        }
        let cooling = self.cooling_backends();
        backends
            .iter()
            .filter(|backend| !cooling.iter().any(|name| name == backend.name()))
            .cloned()
            .collect()
    }

    /// Run `prompt` through the chain.
    ///
    /// Post-processing hooks run only on real content, never on sentinels.
    pub async fn invoke(&self, prompt: &str) -> Result<String, BackendError> {
        if self.chain.is_empty() {
            warn!("No configured backend, returning sentinel");
            return Ok(NO_BACKEND_SENTINEL.to_string());
        }

        let candidates = self.candidates();
        if candidates.is_empty() {
            warn!("Every backend is cooling down after rate limits");
            return Ok(EXHAUSTED_SENTINEL.to_string());
        }

        let mode = match self.effective_mode() {
            InvokeMode::Racing if candidates.len() >= 2 => InvokeMode::Racing,
            _ => InvokeMode::Sequential,
        };
        debug!(
            "Invoking {} of {} backend(s) [{}] in {} mode",
            candidates.len(),
            self.chain.len(),
            candidates.iter().map(|b| b.name()).collect::<Vec<_>>().join(", "),
            mode.as_str()
        );

        let content = match mode {
            InvokeMode::Sequential => match self.invoke_sequential(&candidates, prompt).await? {
                Some(content) => content,
                None => {
                    warn!("Every backend is rate limited");
                    return Ok(EXHAUSTED_SENTINEL.to_string());
                }
            },
            InvokeMode::Racing => self.invoke_racing(&candidates, prompt).await?,
        };

        let report = self.hooks.run(&content).await;
        debug!("Post-processing: {:?}", report);
        Ok(content)
    }

    /// `Ok(None)` when the chain ran out while rate limited.
    async fn invoke_sequential(
        &self,
        backends: &[Arc<dyn Backend>],
        prompt: &str,
    ) -> Result<Option<String>, BackendError> {
        let last = backends.len() - 1;

        for (position, backend) in backends.iter().enumerate() {
            match backend.invoke(prompt).await {
                Ok(content) => {
                    info!("Backend '{}' answered", backend.name());
                    return Ok(Some(content));
                }
                Err(e) if e.is_rate_limited() => {
                    self.mark_rate_limited(backend.name());
                    if !self.auto_fallback {
                        warn!("Backend '{}' rate limited, auto-fallback disabled", backend.name());
                        return Err(e);
                    }
                    warn!("Backend '{}' rate limited, rotating", backend.name());
                }
                Err(e) if position == last => {
                    warn!("Last backend '{}' failed: {}", backend.name(), redact::sanitize(&e.to_string()));
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Backend '{}' failed, trying next: {}",
                        backend.name(),
                        redact::sanitize(&e.to_string())
                    );
                }
            }
        }

        Ok(None)
    }

    async fn invoke_racing(
        &self,
        backends: &[Arc<dyn Backend>],
        prompt: &str,
    ) -> Result<String, BackendError> {
        let mut calls: FuturesUnordered<_> = backends
            .iter()
            .map(|backend| {
                let backend: Arc<dyn Backend> = Arc::clone(backend);
                async move {
                    let outcome = backend.invoke(prompt).await;
                    (backend, outcome)
                }
            })
            .collect();

        let mut last_error = None;
        while let Some((backend, outcome)) = calls.next().await {
            match outcome {
                Ok(content) => {
                    info!(
                        "Backend '{}' won the race, dropping {} pending call(s)",
                        backend.name(),
                        calls.len()
                    );
                    return Ok(content);
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        self.mark_rate_limited(backend.name());
                    }
                    warn!(
                        "Racing backend '{}' failed: {}",
                        backend.name(),
                        redact::sanitize(&e.to_string())
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BackendError::fatal("racing", "no backend answered")))
    }
}
