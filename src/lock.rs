//! Inter-process build lock.
//!
//! Two builds writing the same database would interleave their output, so a
//! build first creates a sentinel file next to its output:
//!
//! ```text
//! site/
//! ├── database.json
//! └── .workbase-build-lock      ← exists while a build runs
//! ```
//!
//! Creation is atomic (`create_new`), so exactly one process wins. The
//! [`BuildLock`] guard removes the file when dropped, on every exit path.
//!
//! A crashed build leaves its lock behind. With `lock.stale_after_secs`
//! configured, a lock older than that is reclaimed; without it, the lock
//! must be removed by hand.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const LOCK_FILE_NAME: &str = ".workbase-build-lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("a build is already in progress (remove {} if it is not)", .0.display())]
    InProgress(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where the lock for a given output lives.
///
/// Beside the output file, or in the database root when writing to stdout.
pub fn lock_path(output: &Path, database_root: &Path) -> PathBuf {
    if output == Path::new("-") {
        return database_root.join(LOCK_FILE_NAME);
    }
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOCK_FILE_NAME),
        _ => PathBuf::from(LOCK_FILE_NAME),
    }
}

/// Held for the duration of a build. Dropping it releases the lock.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    pub fn acquire(path: PathBuf, stale_after: Option<Duration>) -> Result<Self, LockError> {
        match create(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let Some(max_age) = stale_after else {
                    return Err(LockError::InProgress(path));
                };
                if !is_stale(&path, max_age) {
                    return Err(LockError::InProgress(path));
                }
                tracing::warn!(path = %path.display(), "Reclaiming stale build lock");
                std::fs::remove_file(&path)?;
                match create(&path) {
                    Ok(()) => Ok(Self { path }),
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        Err(LockError::InProgress(path))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not remove build lock");
            }
        }
    }
}

fn create(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
}

fn is_stale(path: &Path, max_age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > max_age)
}
