//! Writer lock for a history file.
//!
//! Two overlapping `repopulse-record` runs against the same history would
//! each load, append and rename, silently dropping one snapshot. The writer
//! takes an advisory OS file lock (flock) scoped to the history path and
//! holds it until the process exits. Readers never lock.

use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const WRITER_LOCK_FILE: &str = "repopulse-writer.lock";

/// Held while a process owns writes to one history file.
pub struct WriterLock {
    file: File,
    path: PathBuf,
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = unlock_file(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

/// Acquire the writer lock for `history_path`, failing fast if it is held.
pub fn acquire_writer_lock(history_path: &Path) -> Result<WriterLock> {
    let dir = lock_dir();
    match try_acquire_in(&dir, history_path)? {
        Some(lock) => Ok(lock),
        None => anyhow::bail!(
            "another repopulse-record run is writing {}",
            history_path.display()
        ),
    }
}

fn try_acquire_in(dir: &Path, history_path: &Path) -> Result<Option<WriterLock>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create runtime lock directory: {}", dir.display()))?;

    let path = dir.join(scoped_lock_filename(WRITER_LOCK_FILE, history_path));
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    match lock_file_nonblocking(&file) {
        Ok(()) => {
            // Owner info for debugging a stuck lock.
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = writeln!(file, "history={}", history_path.display());
            let _ = file.flush();

            tracing::debug!(lock = %path.display(), "Acquired writer lock");
            Ok(Some(WriterLock { file, path }))
        }
        Err(e) if is_lock_busy(&e) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to lock file: {}", path.display())),
    }
}

fn lock_dir() -> PathBuf {
    let mut dir = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => std::env::temp_dir(),
    };
    dir.push("repopulse");
    dir
}

/// Lock file name unique to the absolute history path.
fn scoped_lock_filename(base_filename: &str, history_path: &Path) -> String {
    let absolute = std::path::absolute(history_path).unwrap_or_else(|_| history_path.to_path_buf());
    let mut hasher = DefaultHasher::new();
    absolute.to_string_lossy().hash(&mut hasher);
    let digest = hasher.finish();
    format!("{base_filename}.{digest:016x}")
}

fn is_lock_busy(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock)
        || matches!(error.raw_os_error(), Some(11) | Some(35))
}

#[cfg(unix)]
fn lock_file_nonblocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    const LOCK_NB: i32 = 4;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
unsafe extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("repopulse writer locks currently require Unix (macOS/Linux)");
