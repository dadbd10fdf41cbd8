// src/prompt/builder.rs
// Sections always appear in this order:
// persona, execution strategy, recent memory, specialist reports, current input.

use crate::memory::HistoryEntry;
use crate::persona::{EXECUTION_STRATEGY, Persona};

pub const HISTORY_HEADER: &str = "RECENT MEMORY:";
pub const REPORTS_HEADER: &str = "SPECIALIST REPORTS:";
pub const INPUT_HEADER: &str = "CURRENT INPUT:";

/// Render history as `ROLE: text` lines, oldest first.
pub fn build_history_block(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "(no recent conversation)".to_string();
    }
    history
        .iter()
        .map(|entry| format!("{}: {}", entry.role.to_uppercase(), entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the single prompt sent to the backend chain.
pub fn compose_prompt(
    persona: &Persona,
    history: &[HistoryEntry],
    delegation_blocks: &[String],
    input: &str,
) -> String {
    let mut prompt = String::new();

    // 1. Persona + strategy
    prompt.push_str(persona.prompt().trim());
    prompt.push_str("\n\n");
    prompt.push_str(EXECUTION_STRATEGY.trim());
    prompt.push_str("\n\n");

    // 2. History
    prompt.push_str(HISTORY_HEADER);
    prompt.push('\n');
    prompt.push_str(&build_history_block(history));
    prompt.push_str("\n\n");

    // 3. Specialist reports, in rule order
    if !delegation_blocks.is_empty() {
        prompt.push_str(REPORTS_HEADER);
        prompt.push('\n');
        prompt.push_str(&delegation_blocks.join("\n\n"));
        prompt.push_str("\n\n");
    }

    // 4. Raw input, last
    prompt.push_str(INPUT_HEADER);
    prompt.push_str("\nThe user sent: ");
    prompt.push_str(input);
    prompt.push('\n');

    prompt
}
