// file: src/lock.rs
// version: 1.0.0
// guid: runlck01-2345-6789-abcd-ef0123456789

//! Exclusive per-host run lock

use crate::error::BaselineError;
use crate::Result;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOCK_FILE: &str = ".host-baseline.lock";

/// Held for the whole run; released when dropped
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock in `dir` without waiting
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);

        // The file is never unlinked: a second process could otherwise lock a
        // fresh inode at the same path while the first still holds the old one.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(BaselineError::Lock(path));
        }

        debug!("Acquired run lock {}", path.display());
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
