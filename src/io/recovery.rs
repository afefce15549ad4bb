use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::lock::DirLock;

/// Size past which the log is trimmed of prunable entries on the next write (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Default number of days before entries are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// JSON text that failed to import (apply, load)
    Import,
    /// A stored blob that could not be read or written
    Store,
    /// A backend response that could not be used
    Backend,
}

impl std::fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryCategory::Import => write!(f, "import"),
            RecoveryCategory::Store => write!(f, "store"),
            RecoveryCategory::Backend => write!(f, "backend"),
        }
    }
}

/// A single entry in the recovery log: one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, String>,
    /// The rejected or unreadable data, verbatim
    #[serde(default)]
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>, body: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: IndexMap::new(),
            body: body.into(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Summary info about the recovery log.
#[derive(Debug, Clone)]
pub struct RecoverySummary {
    pub entry_count: usize,
    pub oldest: Option<DateTime<Utc>>,
}

/// Return the path to the recovery log file.
pub fn recovery_log_path(workspace_dir: &Path) -> PathBuf {
    workspace_dir.join("recovery.jsonl")
}

// ---------------------------------------------------------------------------
// Atomic file write
// ---------------------------------------------------------------------------

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Append an entry to the log. Failures are reported on stderr, never returned.
pub fn log_recovery(workspace_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = log_recovery_inner(workspace_dir, &entry) {
        eprintln!("warning: could not write to recovery log: {}", e);
    }
}

fn log_recovery_inner(workspace_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(workspace_dir);

    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() > MAX_LOG_SIZE
    {
        let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
        if let Err(e) = rewrite_retaining(&path, |e| e.timestamp >= cutoff) {
            eprintln!("warning: could not trim recovery log: {}", e);
        }
    }

    let mut line = serde_json::to_string(entry).map_err(io::Error::other)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(line.as_bytes())
}

/// Record JSON text that was rejected on import
pub fn log_rejected_import(workspace_dir: &Path, source: &str, reason: &str, text: &str) {
    log_recovery(
        workspace_dir,
        RecoveryEntry::new(RecoveryCategory::Import, reason, text).with_field("Source", source),
    );
}

// ---------------------------------------------------------------------------
// Reading entries
// ---------------------------------------------------------------------------

/// Read entries, most recent first. Unparseable lines are skipped.
pub fn read_recovery_entries(
    workspace_dir: &Path,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
) -> Vec<RecoveryEntry> {
    let mut entries = parse_entries(&recovery_log_path(workspace_dir));

    if let Some(since_dt) = since {
        entries.retain(|e| e.timestamp >= since_dt);
    }

    // Entries are stored oldest-first
    if let Some(n) = limit {
        let skip = entries.len().saturating_sub(n);
        entries = entries.into_iter().skip(skip).collect();
    }

    entries.reverse();
    entries
}

pub fn recovery_summary(workspace_dir: &Path) -> Option<RecoverySummary> {
    let entries = parse_entries(&recovery_log_path(workspace_dir));
    if entries.is_empty() {
        return None;
    }
    Some(RecoverySummary {
        entry_count: entries.len(),
        oldest: entries.first().map(|e| e.timestamp),
    })
}

fn parse_entries(path: &Path) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Prune entries older than `before` (default: `PRUNE_AGE_DAYS` ago), or all
/// of them. Returns the number of entries removed.
pub fn prune_recovery(
    workspace_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(workspace_dir);
    if !path.exists() {
        return Ok(0);
    }

    let _lock = DirLock::acquire_default(workspace_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::WouldBlock, e.to_string()))?;

    if all {
        let count = parse_entries(&path).len();
        atomic_write(&path, b"")?;
        return Ok(count);
    }

    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
    rewrite_retaining(&path, |e| e.timestamp >= cutoff)
}

/// Rewrite the log keeping only entries that pass `keep`. Returns how many
/// were dropped.
fn rewrite_retaining(path: &Path, keep: impl Fn(&RecoveryEntry) -> bool) -> io::Result<usize> {
    let entries = parse_entries(path);
    let before = entries.len();
    let mut out = String::new();
    for entry in entries.iter().filter(|e| keep(e)) {
        out.push_str(&serde_json::to_string(entry).map_err(io::Error::other)?);
        out.push('\n');
    }
    let kept = out.lines().count();
    atomic_write(path, out.as_bytes())?;
    Ok(before - kept)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
