// src/prompt/mod.rs
// Prompt composition for the orchestrator

pub mod builder;

pub use builder::{build_history_block, compose_prompt};
