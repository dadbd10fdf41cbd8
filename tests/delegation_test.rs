// tests/delegation_test.rs
// Specialist round-trips driven by the delegation policy

mod test_helpers;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use neural_core::bus::{Message, MessageBus};
use neural_core::delegation::{
    DelegationPolicy, DelegationRule, DelegationStatus, RuleKind, RuleTable,
};
use neural_core::specialist::{
    CODER_TOPIC, SECURITY_TOPIC, SecuritySpecialist, Specialist, SpecialistRoster,
};
use tokio_util::sync::CancellationToken;
use test_helpers::{EchoSpecialist, FixedSpecialist};

#[tokio::test]
async fn test_missing_specialist_fails_fast() {
    let bus = Arc::new(MessageBus::new());
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(25));

    let started = Instant::now();
    let outcomes = policy.run("session", "corr", "please refactor the parser").await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].topic, CODER_TOPIC);
    assert_eq!(outcomes[0].status, DelegationStatus::Unavailable);
    assert!(outcomes[0].block.contains("UNAVAILABLE"));
}

#[tokio::test]
async fn test_echo_specialist_receives_raw_input() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(EchoSpecialist::new(CODER_TOPIC)));
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(2));

    let outcomes = policy.run("session", "corr", "refactor main.rs").await;

    assert_eq!(outcomes[0].status, DelegationStatus::Answered);
    assert!(outcomes[0].block.contains("echo: refactor main.rs"));
    assert_eq!(bus.pending_replies(), 0);
}

#[tokio::test]
async fn test_blocks_follow_rule_order_not_completion_order() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(
        &bus,
        Arc::new(FixedSpecialist::new(CODER_TOPIC, "CODER-ANSWER").delayed(Duration::from_millis(150))),
    );
    roster.attach(&bus, Arc::new(FixedSpecialist::new(SECURITY_TOPIC, "SECURITY-ANSWER")));
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(2));

    let started = Instant::now();
    let outcomes = policy.run("session", "corr", "refactor code that leaks a secret").await;

    let topics: Vec<&str> = outcomes.iter().map(|o| o.topic.as_str()).collect();
    assert_eq!(topics, vec![CODER_TOPIC, SECURITY_TOPIC]);
    assert!(outcomes[0].block.contains("CODER-ANSWER"));
    assert!(outcomes[1].block.contains("SECURITY-ANSWER"));
    // Round-trips overlap
    assert!(started.elapsed() < Duration::from_millis(290));
}

#[tokio::test]
async fn test_timed_out_specialist_is_cancelled() {
    let bus = Arc::new(MessageBus::new());
    let slow = FixedSpecialist::new(CODER_TOPIC, "too late").delayed(Duration::from_millis(400));
    let completed = slow.completed();
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(slow));
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_millis(60));

    let started = Instant::now();
    let outcomes = policy.run("session", "corr", "refactor everything").await;

    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(outcomes[0].status, DelegationStatus::NoResponse);
    assert!(outcomes[0].block.contains("did not respond"));
    assert_eq!(bus.pending_replies(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_security_specialist_report_reaches_block() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(SecuritySpecialist::new()));
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(2));

    let outcomes = policy
        .run("session", "corr", "security check on my api key: OPENAI_API_KEY=sk-abcdefghijklmnopqrstuvwx")
        .await;

    assert_eq!(outcomes.len(), 2);
    let security = &outcomes[0];
    assert_eq!(security.topic, SECURITY_TOPIC);
    assert!(security.block.contains("Risk level: HIGH"));
    assert!(!security.block.contains("sk-abcdef"));
    // configops is not hosted here
    assert_eq!(outcomes[1].status, DelegationStatus::Unavailable);
}

struct RejectsPatch;

#[async_trait]
impl Specialist for RejectsPatch {
    fn topic(&self) -> &str {
        CODER_TOPIC
    }

    fn description(&self) -> &str {
        "Fails with the patch it could not apply"
    }

    async fn perform(&self, _request: &Message, _cancel: &CancellationToken) -> anyhow::Result<String> {
        anyhow::bail!("patch rejected:\n--- a/x.rs\n+++ b/x.rs\n| not | a | row |")
    }
}

#[tokio::test]
async fn test_failed_report_with_diff_is_decoded() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(RejectsPatch));
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(2));

    let outcomes = policy.run("session", "corr", "refactor x.rs").await;

    let block = &outcomes[0].block;
    assert!(block.contains("Status: ERROR"));
    assert!(block.contains("--- a/x.rs\n+++ b/x.rs\n| not | a | row |"));
    assert!(!block.contains("<br/>"));
    assert!(!block.contains("| Key |"));
}

#[tokio::test]
async fn test_custom_rule_table_drives_delegation() {
    let bus = Arc::new(MessageBus::new());
    let mut roster = SpecialistRoster::new();
    roster.attach(&bus, Arc::new(EchoSpecialist::new("translator")));
    roster.attach(&bus, Arc::new(EchoSpecialist::new("glossary")));
    let rules = RuleTable::new(vec![
        DelegationRule::new("translator", "TRANSLATION", RuleKind::Auxiliary, &["translate"]),
        DelegationRule::new("glossary", "GLOSSARY", RuleKind::Auxiliary, &["term"]),
    ]);
    let policy = DelegationPolicy::new(Arc::clone(&bus), Duration::from_secs(2)).with_rules(rules);

    // Built-in keywords no longer trigger anything
    assert!(policy.run("session", "corr", "refactor the code").await.is_empty());

    let outcomes = policy
        .run("session", "corr", "Translate this term into Portuguese")
        .await;
    let topics: Vec<&str> = outcomes.iter().map(|o| o.topic.as_str()).collect();
    assert_eq!(topics, vec!["translator", "glossary"]);
    assert!(outcomes[0].block.starts_with("[TRANSLATION]\nStatus: SUCCESS"));
    assert!(outcomes[1].block.contains("echo: Translate this term into Portuguese"));
}
