// src/specialist/mod.rs
//! Specialist agents: narrow workers bound to one bus topic.
//!
//! Every agent implements [`Specialist`]. [`SpecialistRoster::attach`] subscribes
//! it on the bus and guarantees the reply contract: exactly one reply per
//! request, addressed to the request's `reply_to` with the same correlation id.
//! Nothing is published once the requester has given up waiting.

pub mod coder;
pub mod configops;
pub mod report;
pub mod researcher;
pub mod security;

pub use coder::CodeSpecialist;
pub use configops::ConfigOpsSpecialist;
pub use report::SpecialistReport;
pub use researcher::ResearchSpecialist;
pub use security::SecuritySpecialist;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{Message, MessageBus};
use crate::redact;

pub const CODER_TOPIC: &str = "coder";
pub const RESEARCHER_TOPIC: &str = "researcher";
pub const SECURITY_TOPIC: &str = "security";
pub const CONFIGOPS_TOPIC: &str = "configops";

#[async_trait]
pub trait Specialist: Send + Sync {
    /// Topic this agent listens on
    fn topic(&self) -> &str;

    fn description(&self) -> &str;

    /// Domain work for one request. `cancel` fires when the requester stops
    /// waiting; long-running work should check it.
    async fn perform(&self, request: &Message, cancel: &CancellationToken) -> anyhow::Result<String>;
}

/// Topic and description of a hosted agent.
#[derive(Debug, Clone, Serialize)]
pub struct SpecialistInfo {
    pub topic: String,
    pub description: String,
}

/// Agents hosted on a bus.
#[derive(Default, Clone)]
pub struct SpecialistRoster {
    agents: Vec<Arc<dyn Specialist>>,
}

impl SpecialistRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `agent` on its topic.
    ///
    /// The handler holds the bus weakly since the bus owns the handler.
    pub fn attach(&mut self, bus: &Arc<MessageBus>, agent: Arc<dyn Specialist>) {
        let topic = agent.topic().to_string();
        let weak: Weak<MessageBus> = Arc::downgrade(bus);
        let hosted = Arc::clone(&agent);

        bus.subscribe(topic.clone(), move |message| {
            let bus = weak.clone();
            let agent = Arc::clone(&hosted);
            async move {
                let Some(bus) = bus.upgrade() else {
                    return Ok(());
                };
                handle_request(&bus, agent.as_ref(), message).await
            }
        });

        info!("Specialist '{}' attached", topic);
        self.agents.push(agent);
    }

    pub fn describe(&self) -> Vec<SpecialistInfo> {
        self.agents
            .iter()
            .map(|agent| SpecialistInfo {
                topic: agent.topic().to_string(),
                description: agent.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Run one request through `agent` and publish its single reply.
pub async fn handle_request(
    bus: &MessageBus,
    agent: &dyn Specialist,
    request: Message,
) -> anyhow::Result<()> {
    let topic = agent.topic();
    if !request.expects_reply() {
        warn!("[{}] request {} has no reply topic, ignoring", topic, request.id);
        return Ok(());
    }

    debug!(
        "[{}] working on '{}' (correlation {})",
        topic,
        redact::preview(&request.task_description, 80),
        request.correlation_id
    );

    let cancel = bus.reply_cancellation(&request.reply_to);
    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            info!("[{}] requester stopped waiting on '{}', dropping work", topic, request.reply_to);
            return Ok(());
        }
        outcome = agent.perform(&request, &cancel) => outcome,
    };

    let report = match outcome {
        Ok(data) => SpecialistReport::success(topic, data),
        Err(e) => {
            warn!("[{}] work failed: {}", topic, redact::sanitize(&format!("{:#}", e)));
            SpecialistReport::failure(topic, redact::sanitize(&format!("{:#}", e)))
        }
    };

    if cancel.is_cancelled() {
        info!("[{}] finished after requester left, reply discarded", topic);
        return Ok(());
    }

    let reply = request.reply(topic, format!("{} report", topic), report.to_table());
    bus.publish(reply).await?;
    Ok(())
}
