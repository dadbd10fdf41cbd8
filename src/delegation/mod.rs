// src/delegation/mod.rs
//! Keyword-driven delegation of sub-tasks to specialists.
//!
//! An ordered rule table decides which specialist topics an input triggers.
//! Primary rules are mutually exclusive (the first match wins); auxiliary
//! rules fire independently. Each triggered topic costs one bus round-trip
//! bounded by a single deadline, and always yields a text block: the
//! specialist's report, an "unavailable" note, or a "did not respond" note.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::{Message, MessageBus};
use crate::specialist::{
    CODER_TOPIC, CONFIGOPS_TOPIC, RESEARCHER_TOPIC, SECURITY_TOPIC, SpecialistReport,
};

pub const ORCHESTRATOR_SENDER: &str = "orchestrator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// At most one primary rule fires per input
    Primary,
    /// Evaluated regardless of other matches
    Auxiliary,
}

#[derive(Debug, Clone)]
pub struct DelegationRule {
    pub topic: String,
    /// Heading of the block handed to the prompt
    pub label: String,
    pub kind: RuleKind,
    keywords: Vec<String>,
}

impl DelegationRule {
    pub fn new(topic: &str, label: &str, kind: RuleKind, keywords: &[&str]) -> Self {
        Self {
            topic: topic.to_string(),
            label: label.to_string(),
            kind,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Substring match against already-lowercased input.
    pub fn matches(&self, input_lower: &str) -> bool {
        self.keywords.iter().any(|k| input_lower.contains(k.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<DelegationRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<DelegationRule>) -> Self {
        Self { rules }
    }

    pub fn default_rules() -> Self {
        let rules: &[(&str, &str, RuleKind, &[&str])] = &[
            (CODER_TOPIC, "CODE SPECIALIST", RuleKind::Primary, &[
                "code", "refactor", "código", "refatorar",
            ]),
            (RESEARCHER_TOPIC, "RESEARCH SPECIALIST", RuleKind::Primary, &[
                "research", "logs", "pesquisa", "pesquisar",
            ]),
            (SECURITY_TOPIC, "SECURITY SPECIALIST", RuleKind::Auxiliary, &[
                "security", "vulnerab", "segurança", "secret",
            ]),
            (CONFIGOPS_TOPIC, "CONFIG DIAGNOSTICS", RuleKind::Auxiliary, &[
                "provider", "api key", "configuração", "diagnos",
            ]),
        ];

        Self::new(
            rules
                .iter()
                .map(|(topic, label, kind, keywords)| DelegationRule::new(topic, label, *kind, keywords))
                .collect(),
        )
    }

    pub fn rules(&self) -> &[DelegationRule] {
        &self.rules
    }

    /// Rules triggered by `input`, in table order.
    pub fn matching(&self, input: &str) -> Vec<&DelegationRule> {
        let lower = input.to_lowercase();
        let mut primary_taken = false;
        let mut matched = Vec::new();

        for rule in &self.rules {
            if rule.kind == RuleKind::Primary && primary_taken {
                continue;
            }
            if rule.matches(&lower) {
                if rule.kind == RuleKind::Primary {
                    primary_taken = true;
                }
                matched.push(rule);
            }
        }
        matched
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationStatus {
    Answered,
    /// Nobody subscribed to the topic
    Unavailable,
    /// Timed out or the request could not be delivered
    NoResponse,
}

#[derive(Debug, Clone)]
pub struct DelegationOutcome {
    pub topic: String,
    pub status: DelegationStatus,
    pub block: String,
}

pub struct DelegationPolicy {
    bus: Arc<MessageBus>,
    rules: RuleTable,
    timeout: Duration,
}

impl DelegationPolicy {
    pub fn new(bus: Arc<MessageBus>, timeout: Duration) -> Self {
        Self {
            bus,
            rules: RuleTable::default_rules(),
            timeout,
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Delegate `input` to every triggered specialist.
    ///
    /// Round-trips run concurrently; outcomes come back in rule order.
    pub async fn run(&self, session_id: &str, correlation_id: &str, input: &str) -> Vec<DelegationOutcome> {
        let matched = self.rules.matching(input);
        if matched.is_empty() {
            debug!("No delegation rule matched");
            return Vec::new();
        }

        info!(
            "Delegating to [{}]",
            matched.iter().map(|r| r.topic.as_str()).collect::<Vec<_>>().join(", ")
        );

        join_all(
            matched
                .into_iter()
                .map(|rule| self.round_trip(rule, session_id, correlation_id, input)),
        )
        .await
    }

    async fn round_trip(
        &self,
        rule: &DelegationRule,
        session_id: &str,
        correlation_id: &str,
        input: &str,
    ) -> DelegationOutcome {
        if !self.bus.has_subscribers(&rule.topic) {
            info!("No specialist listening on '{}'", rule.topic);
            return unavailable(rule);
        }

        let reply_topic = format!(
            "{}.reply.{}.{}.{}",
            ORCHESTRATOR_SENDER, session_id, rule.topic, correlation_id
        );
        let deadline = Instant::now() + self.timeout;

        // Register first: the specialist may answer before publish returns.
        let pending = match self.bus.expect_reply(reply_topic.clone()) {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Cannot await reply from '{}': {}", rule.topic, e);
                return no_response(rule, &e.to_string());
            }
        };

        let request = Message::new(ORCHESTRATOR_SENDER, rule.topic.clone(), input)
            .with_reply_to(reply_topic)
            .with_correlation_id(correlation_id);

        match tokio::time::timeout_at(deadline, self.bus.publish(request)).await {
            Ok(Ok(delivery)) => debug!("Request to '{}' delivered: {:?}", rule.topic, delivery),
            Ok(Err(e)) => {
                warn!("Request to '{}' failed: {}", rule.topic, e);
                return no_response(rule, &e.to_string());
            }
            Err(_) => {
                warn!("Specialist '{}' still busy at deadline", rule.topic);
                return no_response(rule, &format!("no reply within {:?}", self.timeout));
            }
        }

        match pending.wait_until(deadline).await {
            Ok(reply) => {
                debug!("Reply from '{}' received", rule.topic);
                answered(rule, &reply)
            }
            Err(e) => {
                warn!("Specialist '{}' did not respond: {}", rule.topic, e);
                no_response(rule, &e.to_string())
            }
        }
    }
}

fn answered(rule: &DelegationRule, reply: &Message) -> DelegationOutcome {
    let report = SpecialistReport::parse(&reply.payload)
        .unwrap_or_else(|| SpecialistReport::success(reply.sender.clone(), reply.payload.clone()));
    let agent = if report.agent.is_empty() {
        reply.sender.as_str()
    } else {
        report.agent.as_str()
    };

    DelegationOutcome {
        topic: rule.topic.clone(),
        status: DelegationStatus::Answered,
        block: format!(
            "[{}]\nStatus: {}\nAgent: {}\n{}",
            rule.label,
            report.status,
            agent,
            report.data.trim()
        ),
    }
}

fn unavailable(rule: &DelegationRule) -> DelegationOutcome {
    DelegationOutcome {
        topic: rule.topic.clone(),
        status: DelegationStatus::Unavailable,
        block: format!(
            "[{}]\nStatus: UNAVAILABLE\nThe {} specialist is not running. Answer without its input.",
            rule.label, rule.topic
        ),
    }
}

fn no_response(rule: &DelegationRule, reason: &str) -> DelegationOutcome {
    DelegationOutcome {
        topic: rule.topic.clone(),
        status: DelegationStatus::NoResponse,
        block: format!(
            "[{}]\nStatus: NO RESPONSE\nThe {} specialist did not respond ({}). Answer without its input.",
            rule.label, rule.topic, reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(table: &RuleTable, input: &str) -> Vec<String> {
        table.matching(input).iter().map(|r| r.topic.clone()).collect()
    }

    #[test]
    fn test_first_primary_rule_wins() {
        let table = RuleTable::default_rules();
        assert_eq!(topics(&table, "refactor the code and research the logs"), vec!["coder"]);
        assert_eq!(topics(&table, "please check the logs"), vec!["researcher"]);
    }

    #[test]
    fn test_auxiliary_rules_stack_on_primary() {
        let table = RuleTable::default_rules();
        assert_eq!(
            topics(&table, "Refactor this code, is my API key a security problem?"),
            vec!["coder", "security", "configops"]
        );
    }

    #[test]
    fn test_matching_is_case_insensitive_and_unicode() {
        let table = RuleTable::default_rules();
        assert_eq!(topics(&table, "REFATORAR o CÓDIGO"), vec!["coder"]);
        assert_eq!(topics(&table, "Diagnose my providers"), vec!["configops"]);
        assert!(topics(&table, "good morning").is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribed_topic_yields_unavailable_note() {
        let bus = Arc::new(MessageBus::new());
        let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(30));

        let started = std::time::Instant::now();
        let outcomes = policy.run("s1", "c1", "research this").await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, DelegationStatus::Unavailable);
        assert!(outcomes[0].block.contains("RESEARCH SPECIALIST"));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_silent_specialist_degrades_to_note() {
        let bus = Arc::new(MessageBus::new());
        bus.subscribe(CODER_TOPIC, |_message| async { Ok::<(), anyhow::Error>(()) });
        let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_millis(50));

        let outcomes = policy.run("s1", "c1", "refactor it").await;

        assert_eq!(outcomes[0].status, DelegationStatus::NoResponse);
        assert!(outcomes[0].block.contains("did not respond"));
        assert_eq!(bus.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_reply_is_formatted_as_labeled_block() {
        let bus = Arc::new(MessageBus::new());
        let weak = Arc::downgrade(&bus);
        bus.subscribe(CODER_TOPIC, move |message: Message| {
            let weak = weak.clone();
            async move {
                if let Some(bus) = weak.upgrade() {
                    let table = SpecialistReport::success(CODER_TOPIC, "use a trait\nand tests").to_table();
                    bus.publish(message.reply(CODER_TOPIC, "done", table)).await?;
                }
                Ok::<(), anyhow::Error>(())
            }
        });
        let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(1));

        let outcomes = policy.run("s1", "c1", "refactor X").await;

        assert_eq!(outcomes[0].status, DelegationStatus::Answered);
        assert_eq!(
            outcomes[0].block,
            "[CODE SPECIALIST]\nStatus: SUCCESS\nAgent: coder\nuse a trait\nand tests"
        );
    }
}
