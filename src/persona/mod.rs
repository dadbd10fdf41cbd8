// src/persona/mod.rs
// Persona (system text) placed at the top of every composed prompt.
// A "soul" file can replace the built-in persona without a rebuild.

pub mod default;

pub use default::{DEFAULT_PERSONA_PROMPT, EXECUTION_STRATEGY};

use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    text: String,
}

impl Persona {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Load the soul file at `path`, falling back to the built-in persona
    /// when it is missing, unreadable or empty.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                info!("Loaded persona from {}", path.display());
                Self::new(text)
            }
            Ok(_) => {
                warn!("Persona file {} is empty, using default", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Could not read persona file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn prompt(&self) -> &str {
        &self.text
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA_PROMPT)
    }
}
