// src/persistence/snapshot.rs
// Content snapshots stored as one JSON file per commit

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `content` and return the generated commit id.
    async fn save_commit(&self, content: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// Writes `<dir>/<uuid>.json` per commit.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn commit_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub async fn load_commit(&self, id: &str) -> Result<Snapshot> {
        let path = self.commit_path(id);
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("commit {} not found", id))?;
        let snapshot = serde_json::from_str(&json)
            .with_context(|| format!("commit {} is corrupt", id))?;
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save_commit(&self, content: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))?;

        let snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content: content.to_string(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(self.commit_path(&snapshot.id), json).await?;
        Ok(snapshot.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path().join("snapshots"));

        let id = store.save_commit("the answer is 42").await.unwrap();
        let snapshot = store.load_commit(&id).await.unwrap();

        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.content, "the answer is 42");
    }

    #[tokio::test]
    async fn test_load_missing_commit_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path());
        let err = store.load_commit("nope").await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
