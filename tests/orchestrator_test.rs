// tests/orchestrator_test.rs
// Full request/response cycles through the orchestrator

mod test_helpers;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use neural_core::backend::Backend;
use neural_core::bus::MessageBus;
use neural_core::delegation::DelegationPolicy;
use neural_core::error::BackendError;
use neural_core::memory::{InMemoryStore, MemoryStore};
use neural_core::orchestrator::{Orchestrator, UNHANDLED_REPLY};
use neural_core::persona::Persona;
use neural_core::prompt::builder::{HISTORY_HEADER, INPUT_HEADER};
use neural_core::resilience::{NO_BACKEND_SENTINEL, ResilienceInvoker};
use neural_core::session::SessionContext;
use neural_core::specialist::{CODER_TOPIC, SpecialistRoster};
use test_helpers::{FixedSpecialist, ScriptedBackend, build_orchestrator};

#[tokio::test]
async fn test_specialist_reply_lands_between_history_and_input() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(
        &bus,
        Arc::new(FixedSpecialist::new(CODER_TOPIC, "Extract a trait for X and add tests.")),
    );

    let backend = Arc::new(ScriptedBackend::ok("fake", "Here is the refactor."));
    let memory = Arc::new(InMemoryStore::new(10));
    let session = SessionContext::route("telegram", "chat-1", "owner");
    memory
        .remember(&session.session_id, "user", "earlier message")
        .await
        .unwrap();

    let orchestrator = build_orchestrator(&bus, &[backend.clone()], memory, Duration::from_secs(2));
    let reply = orchestrator.process("telegram", "chat-1", "owner", "refactor X").await;

    assert_eq!(reply, "Here is the refactor.");
    let prompt = backend.last_prompt().unwrap();
    let history_at = prompt.find(HISTORY_HEADER).unwrap();
    let earlier_at = prompt.find("USER: earlier message").unwrap();
    let report_at = prompt.find("Extract a trait for X and add tests.").unwrap();
    let input_at = prompt.find(INPUT_HEADER).unwrap();
    let raw_at = prompt.rfind("refactor X").unwrap();

    assert!(prompt.starts_with("TEST PERSONA"));
    assert!(history_at < earlier_at);
    assert!(earlier_at < report_at);
    assert!(report_at < input_at);
    assert!(input_at < raw_at);
}

#[tokio::test]
async fn test_turns_are_remembered_after_each_cycle() {
    let bus = Arc::new(MessageBus::new());
    let backend = Arc::new(ScriptedBackend::ok("fake", "hello back"));
    let memory = Arc::new(InMemoryStore::new(10));
    let orchestrator =
        build_orchestrator(&bus, &[backend.clone()], Arc::clone(&memory), Duration::from_secs(1));

    orchestrator.process("web", "", "alice", "hello").await;
    orchestrator.process("web", "", "alice", "again").await;

    let session = SessionContext::route("web", "", "alice");
    let history = memory.retrieve_recent_context(&session.session_id).await.unwrap();
    let turns: Vec<(&str, &str)> = history
        .iter()
        .map(|e| (e.role.as_str(), e.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            ("user", "hello"),
            ("assistant", "hello back"),
            ("user", "again"),
            ("assistant", "hello back"),
        ]
    );
    assert!(backend.last_prompt().unwrap().contains("ASSISTANT: hello back"));

    // Other users never see this history
    let other = SessionContext::route("web", "", "bob");
    assert!(memory.retrieve_recent_context(&other.session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_failure_becomes_text() {
    let bus = Arc::new(MessageBus::new());
    let backend = Arc::new(ScriptedBackend::with_outcome(
        "openai",
        Err(BackendError::fatal("openai", "401 invalid key sk-leaked")),
    ));
    let orchestrator = build_orchestrator(
        &bus,
        &[backend],
        Arc::new(InMemoryStore::new(10)),
        Duration::from_secs(1),
    );

    let reply = orchestrator.process("web", "c", "u", "hi").await;
    assert!(reply.contains("openai"));
    assert!(!reply.contains("sk-leaked"));
}

#[tokio::test]
async fn test_no_backend_and_no_specialists_still_answers() {
    let bus = Arc::new(MessageBus::new());
    let orchestrator =
        build_orchestrator(&bus, &[], Arc::new(InMemoryStore::new(10)), Duration::from_secs(30));

    let started = std::time::Instant::now();
    let reply = orchestrator
        .process("web", "c", "u", "research the logs and diagnose the provider")
        .await;

    assert_eq!(reply, NO_BACKEND_SENTINEL);
    assert!(started.elapsed() < Duration::from_secs(1));
}

struct Panics;

#[async_trait]
impl Backend for Panics {
    fn name(&self) -> &str {
        "panics"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn invoke(&self, _prompt: &str) -> Result<String, BackendError> {
        panic!("backend bug");
    }
}

#[tokio::test]
async fn test_panic_is_converted_to_unhandled_reply() {
    let bus = Arc::new(MessageBus::new());
    let backends = vec![Arc::new(Panics) as Arc<dyn Backend>];
    let invoker = ResilienceInvoker::new(neural_core::backend::FallbackChain::build(backends, ""));
    let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new(10));
    let orchestrator = Orchestrator::new(
        DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(1)),
        invoker,
        memory,
        Persona::default(),
    );

    assert_eq!(orchestrator.process("web", "c", "u", "hi").await, UNHANDLED_REPLY);
}
