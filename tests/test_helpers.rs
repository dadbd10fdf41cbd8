// tests/test_helpers.rs
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use neural_core::{
    backend::{Backend, FallbackChain},
    bus::{Message, MessageBus},
    config::CoreConfig,
    delegation::DelegationPolicy,
    error::BackendError,
    memory::{InMemoryStore, MemoryStore},
    orchestrator::Orchestrator,
    persona::Persona,
    resilience::ResilienceInvoker,
    specialist::{Specialist, SpecialistRoster},
    state::AppState,
};

/// Backend that sleeps, then returns a fixed outcome. Records every prompt.
pub struct ScriptedBackend {
    name: String,
    delay: Duration,
    outcome: Result<String, BackendError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn ok(name: &str, text: &str) -> Self {
        Self::with_outcome(name, Ok(text.to_string()))
    }

    pub fn rate_limited(name: &str) -> Self {
        Self::with_outcome(name, Err(BackendError::rate_limited(name, "429 Too Many Requests")))
    }

    pub fn transient(name: &str) -> Self {
        Self::with_outcome(name, Err(BackendError::transient(name, "503 Service Unavailable")))
    }

    pub fn with_outcome(name: &str, outcome: Result<String, BackendError>) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            outcome,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn invoke(&self, prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

pub fn chain_of(backends: &[Arc<ScriptedBackend>]) -> FallbackChain {
    let backends: Vec<Arc<dyn Backend>> = backends
        .iter()
        .map(|b| Arc::clone(b) as Arc<dyn Backend>)
        .collect();
    FallbackChain::build(backends, "")
}

/// Specialist answering every request with fixed text after `delay`.
/// Counts how many requests ran to completion.
pub struct FixedSpecialist {
    topic: String,
    answer: String,
    delay: Duration,
    completed: Arc<AtomicUsize>,
}

impl FixedSpecialist {
    pub fn new(topic: &str, answer: &str) -> Self {
        Self {
            topic: topic.to_string(),
            answer: answer.to_string(),
            delay: Duration::ZERO,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn completed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }
}

#[async_trait]
impl Specialist for FixedSpecialist {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn description(&self) -> &str {
        "Fixed answer for tests"
    }

    async fn perform(&self, _request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Specialist echoing the task it was given.
pub struct EchoSpecialist {
    topic: String,
}

impl EchoSpecialist {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl Specialist for EchoSpecialist {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn description(&self) -> &str {
        "Echoes the task back"
    }

    async fn perform(&self, request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        Ok(format!("echo: {}", request.task_description))
    }
}

/// Orchestrator over in-memory history and the given bus and backends.
pub fn build_orchestrator(
    bus: &Arc<MessageBus>,
    backends: &[Arc<ScriptedBackend>],
    memory: Arc<InMemoryStore>,
    specialist_timeout: Duration,
) -> Orchestrator {
    let invoker = ResilienceInvoker::new(chain_of(backends)).with_auto_fallback(true);
    let delegation = DelegationPolicy::new(Arc::clone(bus), specialist_timeout);
    let memory: Arc<dyn MemoryStore> = memory;
    Orchestrator::new(delegation, invoker, memory, Persona::new("TEST PERSONA"))
}

/// AppState with fake backends and the given specialists attached.
pub fn create_test_app_state(
    backends: &[Arc<ScriptedBackend>],
    specialists: Vec<Arc<dyn Specialist>>,
) -> AppState {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    for agent in specialists {
        roster.attach(&bus, agent);
    }
    let orchestrator = build_orchestrator(
        &bus,
        backends,
        Arc::new(InMemoryStore::new(10)),
        Duration::from_secs(2),
    );

    AppState {
        config: Arc::new(CoreConfig::default()),
        bus,
        roster,
        orchestrator: Arc::new(orchestrator),
    }
}
