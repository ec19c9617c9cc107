//! File-backed history store
//!
//! The history lives in a single JSON array. Reads never lock: a persist
//! writes a sibling temp file, fsyncs it, then renames it over the target, so
//! a reader sees either the old or the new file in full.

use crate::config::HistoryConfig;
use crate::error::{Error, Result};
use crate::types::MetricsHistory;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Outcome of a successful [`MetricsHistoryStore::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub path: PathBuf,
    /// Snapshots written
    pub snapshots: usize,
    /// Bytes written
    pub bytes: usize,
    /// Hex SHA-256 of the written file
    pub sha256: String,
}

/// Loads and atomically persists a [`MetricsHistory`].
#[derive(Debug, Clone)]
pub struct MetricsHistoryStore {
    path: PathBuf,
    io_timeout: Duration,
}

impl MetricsHistoryStore {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            io_timeout,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(
            config.resolved_path(),
            Duration::from_millis(config.io_timeout_ms),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the history.
    ///
    /// A missing file is an empty history. A file that is not a JSON array of
    /// snapshots is [`Error::CorruptHistory`].
    pub fn load(&self) -> Result<MetricsHistory> {
        let path = self.path.clone();
        let content = with_timeout("history load", self.io_timeout, move || {
            match std::fs::read_to_string(&path) {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::Io(e)),
            }
        })?;

        let Some(content) = content else {
            tracing::debug!(path = %self.path.display(), "No history file yet");
            return Ok(MetricsHistory::default());
        };

        let history: MetricsHistory =
            serde_json::from_str(&content).map_err(|e| Error::CorruptHistory {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            path = %self.path.display(),
            snapshots = history.len(),
            "Loaded history"
        );
        Ok(history)
    }

    /// Read the history, substituting an empty one on any read-side error.
    ///
    /// For read-only callers. A writer must use [`load`](Self::load) so that a
    /// transient I/O failure never replaces the committed file.
    pub fn load_or_empty(&self) -> MetricsHistory {
        match self.load() {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable history; starting from an empty history"
                );
                MetricsHistory::default()
            }
        }
    }

    /// Atomically replace the history file with `history`.
    ///
    /// On error the previously committed file is left as it was.
    pub fn persist(&self, history: &MetricsHistory) -> Result<PersistReport> {
        let mut bytes = serde_json::to_vec_pretty(history)?;
        bytes.push(b'\n');
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let len = bytes.len();

        let path = self.path.clone();
        let stale_after = self.io_timeout;
        with_timeout("history persist", self.io_timeout, move || {
            write_atomic(&path, &bytes, stale_after)
                .map_err(|source| Error::Persist { path, source })
        })?;

        tracing::info!(
            path = %self.path.display(),
            snapshots = history.len(),
            bytes = len,
            sha256 = %sha256,
            "Persisted history"
        );

        Ok(PersistReport {
            path: self.path.clone(),
            snapshots: history.len(),
            bytes: len,
            sha256,
        })
    }
}

// ============================================
// Atomic write
// ============================================

const STAGED_SUFFIX: &str = ".tmp";

fn write_atomic(path: &Path, bytes: &[u8], stale_after: Duration) -> std::io::Result<()> {
    let staged = stage(path, bytes, stale_after)?;
    commit(staged, path)
}

/// Prefix of temp files staged for `path`, e.g. `.history.json.`.
fn staged_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "history".to_string());
    format!(".{name}.")
}

/// Write `bytes` to a temp file next to `path` and flush it to disk.
///
/// Staged files older than `stale_after` were left by an abandoned persist
/// and are removed first. Dropping the returned file deletes it.
fn stage(path: &Path, bytes: &[u8], stale_after: Duration) -> std::io::Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let prefix = staged_prefix(path);
    sweep_stale(&parent, &prefix, stale_after);

    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(STAGED_SUFFIX)
        .tempfile_in(&parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// Best-effort removal of orphaned staged files in `dir`.
fn sweep_stale(dir: &Path, prefix: &str, stale_after: Duration) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(prefix) || !name.ends_with(STAGED_SUFFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        if age.is_some_and(|age| age > stale_after) {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => tracing::info!(path = %entry.path().display(), "Removed stale staged history"),
                Err(e) => tracing::debug!(path = %entry.path().display(), error = %e, "Could not remove stale staged history"),
            }
        }
    }
}

fn commit(staged: NamedTempFile, path: &Path) -> std::io::Result<()> {
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Run blocking file I/O on a worker thread, giving up after `timeout`.
///
/// The worker is detached on timeout; it cannot corrupt the target because
/// the only mutation it performs is the final rename.
fn with_timeout<T, F>(operation: &str, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("repopulse-{}", operation.replace(' ', "-")))
        .spawn(move || {
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(operation, timeout_ms, "File operation timed out");
            Err(Error::Timeout {
                operation: operation.to_string(),
                timeout_ms,
            })
        }
    }
}
