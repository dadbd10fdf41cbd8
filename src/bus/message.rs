// src/bus/message.rs
// Envelope exchanged between the orchestrator and specialist agents

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message routed through the [`MessageBus`](super::MessageBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Name of the sending agent (e.g. "orchestrator")
    pub sender: String,
    /// Topic this message is delivered to. Never empty.
    pub target_topic: String,
    /// Topic the receiver must answer on; empty when no reply is expected
    #[serde(default)]
    pub reply_to: String,
    /// Ties every round-trip of one user request together
    #[serde(default)]
    pub correlation_id: String,
    pub task_description: String,
    #[serde(default)]
    pub payload: String,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        target_topic: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            target_topic: target_topic.into(),
            reply_to: String::new(),
            correlation_id: String::new(),
            task_description: task_description.into(),
            payload: String::new(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = reply_to.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn expects_reply(&self) -> bool {
        !self.reply_to.is_empty()
    }

    /// Build the answer to this message: addressed to `reply_to`,
    /// carrying the same correlation id.
    pub fn reply(
        &self,
        sender: impl Into<String>,
        task_description: impl Into<String>,
        payload: impl Into<String>,
    ) -> Message {
        Message::new(sender, self.reply_to.clone(), task_description)
            .with_correlation_id(self.correlation_id.clone())
            .with_payload(payload)
    }
}
