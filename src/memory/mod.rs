// src/memory/mod.rs

//! Session history consumed by the orchestrator.
//! Stores hand back a bounded, chronological "recent window"; any longer-term
//! decay policy belongs to the store, not to the core.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(session_id: &str, role: &str, content: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The session's most recent turns, oldest first, already bounded.
    async fn retrieve_recent_context(&self, session_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Record one turn for later retrieval.
    async fn remember(&self, session_id: &str, role: &str, content: &str) -> Result<()>;
}

/// Keep the `window` newest entries and return them oldest first.
pub fn recent_window(mut entries: Vec<HistoryEntry>, window: usize) -> Vec<HistoryEntry> {
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let start = entries.len().saturating_sub(window);
    entries.split_off(start)
}

/// Process-local store, mainly for tests and ephemeral runs.
pub struct InMemoryStore {
    window: usize,
    sessions: Mutex<HashMap<String, Vec<HistoryEntry>>>,
}

impl InMemoryStore {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn retrieve_recent_context(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        let entries = self.sessions.lock().get(session_id).cloned().unwrap_or_default();
        Ok(recent_window(entries, self.window))
    }

    async fn remember(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        self.sessions
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .push(HistoryEntry::new(session_id, role, content));
        Ok(())
    }
}

/// One append-only `<session>.jsonl` file per session.
pub struct JsonlMemoryStore {
    dir: PathBuf,
    window: usize,
}

impl JsonlMemoryStore {
    pub fn new(dir: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            dir: dir.into(),
            window,
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", session_id))
    }
}

#[async_trait]
impl MemoryStore for JsonlMemoryStore {
    async fn retrieve_recent_context(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        let path = self.session_path(session_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };

        let entries = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping corrupt history line in {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        Ok(recent_window(entries, self.window))
    }

    async fn remember(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut line = serde_json::to_string(&HistoryEntry::new(session_id, role, content))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session_path(session_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_recent_window_keeps_newest_in_order() {
        let base = Utc::now();
        let entries: Vec<HistoryEntry> = (0..5)
            .rev()
            .map(|i| HistoryEntry {
                session_id: "s".into(),
                role: "user".into(),
                content: format!("m{}", i),
                timestamp: base + Duration::seconds(i),
            })
            .collect();

        let window = recent_window(entries, 3);
        let contents: Vec<_> = window.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_in_memory_store_isolates_sessions() {
        let store = InMemoryStore::new(10);
        store.remember("a", "user", "hello").await.unwrap();
        store.remember("b", "user", "other").await.unwrap();

        let a = store.retrieve_recent_context("a").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "hello");
        assert!(store.retrieve_recent_context("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_store_bounds_window() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonlMemoryStore::new(tmp.path(), 2);
        for turn in ["one", "two", "three"] {
            store.remember("s1", "user", turn).await.unwrap();
        }

        let recent = store.retrieve_recent_context("s1").await.unwrap();
        let contents: Vec<_> = recent.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }
}
