// src/session.rs
// Deterministic session ids so platforms, channels and users never share context

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub platform: String,
    pub channel: String,
    pub user: String,
}

impl SessionContext {
    /// Session id = lowercase hex SHA-256 of `platform::channel::user`.
    pub fn route(platform: &str, channel: &str, user: &str) -> Self {
        let raw = format!("{}::{}::{}", platform, channel, user);
        let session_id = format!("{:x}", Sha256::digest(raw.as_bytes()));
        Self {
            session_id,
            platform: platform.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
        }
    }

    /// Short prefix for log lines.
    pub fn short_id(&self) -> &str {
        &self.session_id[..12.min(self.session_id.len())]
    }
}
