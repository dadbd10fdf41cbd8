// src/persistence/ledger.rs
//! Append-only knowledge ledger.
//!
//! Each line of the JSONL file is an entry that commits to its predecessor
//! through a SHA-256 hash, so tampering with any earlier line breaks
//! [`HashChainLedger::verify`]. There is no mining or peer sync.
//!
//! An append interrupted mid-write leaves a torn last line. Opening the
//! ledger keeps the intact prefix, moves the original file aside and
//! continues the chain from the last intact entry.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, record: LedgerRecord) -> Result<()>;
}

/// Payload recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: String,
    pub author: String,
    pub data: String,
}

impl LedgerRecord {
    pub fn new(author: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub timestamp: String,
    pub previous_hash: String,
    pub record: LedgerRecord,
    pub hash: String,
}

impl LedgerEntry {
    fn compute_hash(index: u64, timestamp: &str, previous_hash: &str, record: &LedgerRecord) -> Result<String> {
        let payload = serde_json::to_string(&(index, timestamp, previous_hash, record))?;
        Ok(format!("{:x}", Sha256::digest(payload.as_bytes())))
    }

    pub fn is_intact(&self) -> bool {
        Self::compute_hash(self.index, &self.timestamp, &self.previous_hash, &self.record)
            .is_ok_and(|hash| hash == self.hash)
    }
}

struct Tip {
    next_index: u64,
    last_hash: String,
}

pub struct HashChainLedger {
    path: PathBuf,
    tip: Mutex<Tip>,
}

impl HashChainLedger {
    /// Open (or lazily create) the ledger at `path`, resuming after the last entry.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = read_contents(&path).await?;
        let (entries, dropped) = intact_prefix(&contents);
        if dropped > 0 {
            warn!(
                "Ledger {} has {} unreadable line(s) after entry #{}, truncating",
                path.display(),
                dropped,
                entries.len()
            );
            repair(&path, &contents, &entries).await?;
        }
        let tip = match entries.last() {
            Some(last) => Tip {
                next_index: last.index + 1,
                last_hash: last.hash.clone(),
            },
            None => Tip {
                next_index: 0,
                last_hash: GENESIS_HASH.to_string(),
            },
        };
        Ok(Self {
            path,
            tip: Mutex::new(tip),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        read_entries(&self.path).await
    }

    /// Check every hash and back-link. Returns the number of entries.
    pub async fn verify(&self) -> Result<usize> {
        let entries = self.entries().await?;
        let mut previous = GENESIS_HASH.to_string();
        for (position, entry) in entries.iter().enumerate() {
            if entry.index != position as u64 {
                bail!("entry {} has index {}", position, entry.index);
            }
            if entry.previous_hash != previous {
                bail!("entry {} has an invalid previous hash", entry.index);
            }
            if !entry.is_intact() {
                bail!("entry {} hash does not match its contents", entry.index);
            }
            previous = entry.hash.clone();
        }
        Ok(entries.len())
    }
}

#[async_trait]
impl Ledger for HashChainLedger {
    async fn append(&self, record: LedgerRecord) -> Result<()> {
        let mut tip = self.tip.lock().await;

        let timestamp = Utc::now().to_rfc3339();
        let hash = LedgerEntry::compute_hash(tip.next_index, &timestamp, &tip.last_hash, &record)?;
        let entry = LedgerEntry {
            index: tip.next_index,
            timestamp,
            previous_hash: tip.last_hash.clone(),
            record,
            hash,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tip.next_index += 1;
        tip.last_hash = entry.hash;
        Ok(())
    }
}

async fn read_contents(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("reading ledger {}", path.display())),
    }
}

async fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>> {
    read_contents(path)
        .await?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("corrupt ledger line"))
        .collect()
}

/// Entries up to the first unreadable line, and how many lines follow from there.
fn intact_prefix(contents: &str) -> (Vec<LedgerEntry>, usize) {
    let lines: Vec<&str> = contents.lines().filter(|line| !line.trim().is_empty()).collect();
    let entries: Vec<LedgerEntry> = lines
        .iter()
        .map_while(|line| serde_json::from_str(line).ok())
        .collect();
    let dropped = lines.len() - entries.len();
    (entries, dropped)
}

/// Keep the damaged file next to the ledger and rewrite it with `entries` only.
async fn repair(path: &Path, contents: &str, entries: &[LedgerEntry]) -> Result<()> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S")));
    let backup = PathBuf::from(backup);
    tokio::fs::write(&backup, contents)
        .await
        .with_context(|| format!("saving damaged ledger to {}", backup.display()))?;

    let mut intact = String::new();
    for entry in entries {
        intact.push_str(&serde_json::to_string(entry)?);
        intact.push('\n');
    }
    tokio::fs::write(path, intact)
        .await
        .with_context(|| format!("rewriting ledger {}", path.display()))
}
