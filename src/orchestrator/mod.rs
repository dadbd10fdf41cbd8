//! Orchestrator - one request/response cycle per incoming message
//!
//! `process` runs, in order:
//! - delegation to specialists over the bus
//! - retrieval of the session's recent history
//! - prompt composition (persona, history, specialist reports, input)
//! - the resilience invoker over the backend chain
//!
//! It never fails: backend errors, panics and unreachable specialists all
//! end up as text in the returned reply.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::delegation::DelegationPolicy;
use crate::error::BackendError;
use crate::memory::MemoryStore;
use crate::persona::Persona;
use crate::prompt::compose_prompt;
use crate::redact;
use crate::resilience::{InvokeMode, ResilienceInvoker};
use crate::session::SessionContext;

pub const UNHANDLED_REPLY: &str =
    "Something went wrong while preparing my answer. Please try again.";

/// Where a cycle currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting on this many specialist round-trips
    Delegating(usize),
    Composing,
    Invoking(InvokeMode),
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Delegating(n) => write!(f, "delegating({})", n),
            Phase::Composing => write!(f, "composing"),
            Phase::Invoking(mode) => write!(f, "invoking({})", mode.as_str()),
            Phase::Done => write!(f, "done"),
        }
    }
}

pub struct Orchestrator {
    delegation: DelegationPolicy,
    invoker: ResilienceInvoker,
    memory: Arc<dyn MemoryStore>,
    persona: Persona,
}

impl Orchestrator {
    pub fn new(
        delegation: DelegationPolicy,
        invoker: ResilienceInvoker,
        memory: Arc<dyn MemoryStore>,
        persona: Persona,
    ) -> Self {
        Self {
            delegation,
            invoker,
            memory,
            persona,
        }
    }

    pub fn invoker(&self) -> &ResilienceInvoker {
        &self.invoker
    }

    pub fn delegation(&self) -> &DelegationPolicy {
        &self.delegation
    }

    /// Entry point for every gateway.
    pub async fn process(&self, platform: &str, channel: &str, user: &str, text: &str) -> String {
        let session = SessionContext::route(platform, channel, user);
        self.process_session(&session, text).await
    }

    /// Same as [`process`](Self::process) for an already routed session.
    pub async fn process_session(&self, session: &SessionContext, text: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            "[{}] {}/{} from '{}': {}",
            session.short_id(),
            session.platform,
            session.channel,
            session.user,
            redact::preview(text, 120)
        );

        let cycle = AssertUnwindSafe(self.run_cycle(session, &correlation_id, text));
        match cycle.catch_unwind().await {
            Ok(reply) => reply,
            Err(_) => {
                error!("[{}] cycle {} panicked", session.short_id(), correlation_id);
                UNHANDLED_REPLY.to_string()
            }
        }
    }

    async fn run_cycle(&self, session: &SessionContext, correlation_id: &str, text: &str) -> String {
        let sid = session.session_id.as_str();
        let mut phase = Phase::Idle;
        let mut enter = |next: Phase| {
            debug!("[{}] {} -> {}", session.short_id(), phase, next);
            phase = next;
        };

        // ====================================================================
        // Delegation
        // ====================================================================

        enter(Phase::Delegating(self.delegation.rules().matching(text).len()));
        let blocks: Vec<String> = self
            .delegation
            .run(sid, correlation_id, text)
            .await
            .into_iter()
            .map(|outcome| outcome.block)
            .collect();

        // ====================================================================
        // Prompt
        // ====================================================================

        enter(Phase::Composing);
        let history = match self.memory.retrieve_recent_context(sid).await {
            Ok(history) => history,
            Err(e) => {
                warn!("[{}] history unavailable: {:#}", session.short_id(), e);
                Vec::new()
            }
        };
        let prompt = compose_prompt(&self.persona, &history, &blocks, text);
        debug!(
            "[{}] prompt: {} chars, {} history entries, {} report(s)",
            session.short_id(),
            prompt.len(),
            history.len(),
            blocks.len()
        );

        // ====================================================================
        // Backends
        // ====================================================================

        enter(Phase::Invoking(self.invoker.effective_mode()));
        let reply = match self.invoker.invoke(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    "[{}] backend chain failed: {}",
                    session.short_id(),
                    redact::sanitize(&e.to_string())
                );
                user_safe_failure(&e)
            }
        };

        self.remember(sid, "user", text).await;
        self.remember(sid, "assistant", &reply).await;

        enter(Phase::Done);
        reply
    }

    async fn remember(&self, session_id: &str, role: &str, content: &str) {
        if let Err(e) = self.memory.remember(session_id, role, content).await {
            warn!("Failed to record {} turn: {:#}", role, e);
        }
    }
}

/// Reply text for a chain failure. Never includes the provider's message.
pub fn user_safe_failure(error: &BackendError) -> String {
    match error {
        BackendError::RateLimited { backend, .. } => format!(
            "The {} backend is rate limited right now. Please try again in a moment.",
            backend
        ),
        BackendError::Transient { backend, .. } => format!(
            "I could not reach the {} backend. Please try again in a moment.",
            backend
        ),
        BackendError::Fatal { backend, .. } => format!(
            "The {} backend rejected the request. Check its configuration and try again.",
            backend
        ),
    }
}
