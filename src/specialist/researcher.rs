// src/specialist/researcher.rs
// Research specialist: digests recent log files under the data directory and,
// when a backend is wired, asks it to interpret the digest for the task.

use anyhow::Context;
use async_trait::async_trait;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{RESEARCHER_TOPIC, Specialist};
use crate::backend::Backend;
use crate::bus::Message;
use crate::redact;

const LOG_EXTENSIONS: &[&str] = &["log", "jsonl"];
const QUOTED_LINES: usize = 5;
const DEFAULT_DAYS_BACK: u64 = 7;

/// Counts and the latest problem lines found in the scanned logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDigest {
    pub files: usize,
    pub lines: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Most recent error lines, oldest first, already redacted
    pub latest_errors: Vec<String>,
}

impl LogDigest {
    pub fn render(&self) -> String {
        let mut out = format!(
            "Scanned {} log file(s), {} line(s): {} error(s), {} warning(s).",
            self.files, self.lines, self.errors, self.warnings
        );
        if !self.latest_errors.is_empty() {
            out.push_str("\nLatest errors:");
            for line in &self.latest_errors {
                out.push_str("\n- ");
                out.push_str(line);
            }
        }
        out
    }
}

pub struct ResearchSpecialist {
    logs_dir: PathBuf,
    max_age: Duration,
    backend: Option<Arc<dyn Backend>>,
}

impl ResearchSpecialist {
    pub fn new(logs_dir: impl Into<PathBuf>, backend: Option<Arc<dyn Backend>>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            max_age: Duration::from_secs(DEFAULT_DAYS_BACK * 24 * 60 * 60),
            backend,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Walk `dir` for recent log files. Stops early when `cancel` fires.
    pub fn scan_logs(dir: &Path, max_age: Duration, cancel: &CancellationToken) -> LogDigest {
        let mut digest = LogDigest::default();
        if !dir.exists() {
            debug!("[researcher] logs dir {} does not exist", dir.display());
            return digest;
        }

        let cutoff = SystemTime::now().checked_sub(max_age);
        let mut files: Vec<(SystemTime, PathBuf)> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| LOG_EXTENSIONS.contains(&ext))
            })
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                match cutoff {
                    Some(cutoff) if modified < cutoff => None,
                    _ => Some((modified, entry.into_path())),
                }
            })
            .collect();
        files.sort();

        for (_, path) in files {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = Self::scan_file(&path, &mut digest) {
                warn!("[researcher] skipping {}: {:#}", path.display(), e);
            }
        }
        digest
    }

    fn scan_file(path: &Path, digest: &mut LogDigest) -> anyhow::Result<()> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        digest.files += 1;

        for line in BufReader::new(file).lines() {
            let line = line?;
            digest.lines += 1;
            let lower = line.to_lowercase();
            if lower.contains("error") || lower.contains("exception") || lower.contains("fatal") {
                digest.errors += 1;
                digest.latest_errors.push(redact::preview(line.trim(), 200));
                if digest.latest_errors.len() > QUOTED_LINES {
                    digest.latest_errors.remove(0);
                }
            } else if lower.contains("warn") {
                digest.warnings += 1;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Specialist for ResearchSpecialist {
    fn topic(&self) -> &str {
        RESEARCHER_TOPIC
    }

    fn description(&self) -> &str {
        "Investigates recent logs and gathers evidence"
    }

    async fn perform(&self, request: &Message, cancel: &CancellationToken) -> anyhow::Result<String> {
        let dir = self.logs_dir.clone();
        let max_age = self.max_age;
        let token = cancel.clone();
        let digest = tokio::task::spawn_blocking(move || Self::scan_logs(&dir, max_age, &token))
            .await
            .context("Log scan task failed")?;

        let rendered = digest.render();
        let Some(backend) = &self.backend else {
            return Ok(rendered);
        };

        debug!("[researcher] summarising digest via '{}'", backend.name());
        let prompt = format!(
            "You are a research assistant. Using the log digest below, answer the task in a few sentences.\n\n\
             TASK:\n{}\n\nLOG DIGEST:\n{}",
            redact::sanitize(&request.task_description),
            rendered
        );
        let summary = backend.invoke(&prompt).await?;
        Ok(format!("{}\n\n{}", summary.trim(), rendered))
    }
}
