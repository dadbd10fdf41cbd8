// src/error.rs
//! Error taxonomy for the coordination core.
//!
//! Bus and backend failures are typed so callers can branch on them
//! (rotate on rate limits, degrade on timeouts). Everything above the
//! core (stores, server, CLI) uses `anyhow`.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the in-process message bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// No reply arrived on `topic` before the deadline.
    #[error("timeout after {after:?} waiting for reply on '{topic}'")]
    Timeout { topic: String, after: Duration },

    /// Another caller already awaits a reply on this topic.
    #[error("a reply on '{topic}' is already awaited")]
    ReplyAlreadyAwaited { topic: String },

    #[error("message has an empty target topic")]
    EmptyTopic,
}

/// Failures raised by a reasoning backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Quota or rate limit hit. Retryable on a different backend.
    #[error("{backend} rate limited: {message}")]
    RateLimited { backend: String, message: String },

    /// Network failure, timeout or 5xx.
    #[error("{backend} transient failure: {message}")]
    Transient { backend: String, message: String },

    /// Anything the backend will keep rejecting (bad request, auth, malformed body).
    #[error("{backend} failed: {message}")]
    Fatal { backend: String, message: String },
}

impl BackendError {
    pub fn rate_limited(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn transient(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn fatal(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Name of the backend that produced the error.
    pub fn backend(&self) -> &str {
        match self {
            Self::RateLimited { backend, .. }
            | Self::Transient { backend, .. }
            | Self::Fatal { backend, .. } => backend,
        }
    }
}
