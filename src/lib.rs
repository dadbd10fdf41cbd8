// src/lib.rs

pub mod backend;
pub mod bus;
pub mod config;
pub mod delegation;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod persistence;
pub mod persona;
pub mod prompt;
pub mod redact;
pub mod resilience;
pub mod server;
pub mod session;
pub mod specialist;
pub mod state;
