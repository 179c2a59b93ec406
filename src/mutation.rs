// file: src/mutation.rs
// version: 1.1.0
// guid: mutate01-2345-6789-abcd-ef0123456789

//! Backup-then-write for every system file a run touches
//!
//! Before a pre-existing file is overwritten it is copied verbatim into the
//! run's backup directory as `<basename>.bak.<timestamp>` and a
//! [`MutationRecord`] is appended to the run's [`BackupSet`]. The rollback
//! script is generated from that set, so the naming convention and the record
//! are a contract with [`crate::rollback`].

use crate::host::Host;
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// One backed-up file. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    /// Absolute path of the original file
    pub original: PathBuf,
    /// Where the verbatim copy was stored
    pub backup: PathBuf,
    /// Timestamp of the run that took the backup
    pub timestamp: String,
}

/// Append-only, ordered record of the backups taken during one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupSet {
    timestamp: String,
    records: Vec<MutationRecord>,
    /// Files that did not exist before the run and so have no backup
    created: Vec<PathBuf>,
}

impl BackupSet {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            records: Vec::new(),
            created: Vec::new(),
        }
    }

    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, original: &Path) -> Option<&MutationRecord> {
        self.records.iter().find(|r| r.original == original)
    }

    fn push(&mut self, record: MutationRecord) {
        self.records.push(record);
    }

    fn note_created(&mut self, path: &Path) {
        if !self.created.iter().any(|p| p == path) {
            self.created.push(path.to_path_buf());
        }
    }
}

/// Result of a mutation request
#[derive(Debug, Clone)]
pub struct MutationHandle {
    pub path: PathBuf,
    /// Backup of the pre-existing file, `None` if the file is new
    pub record: Option<MutationRecord>,
    /// False when the desired content was already in place
    pub changed: bool,
}

impl MutationHandle {
    /// Human readable location of the backup, for operator messages
    pub fn backup_hint(&self) -> String {
        match &self.record {
            Some(record) => record.backup.display().to_string(),
            None => "no backup (the file did not exist before this run)".to_string(),
        }
    }
}

/// The shared write primitive used by every configurator
pub struct SafeFileMutator {
    backup_dir: PathBuf,
    backup_set: BackupSet,
}

impl SafeFileMutator {
    /// `backup_dir` is a system path, resolved against the host root
    pub fn new(host: &Host, backup_dir: impl AsRef<Path>, timestamp: impl Into<String>) -> Self {
        Self {
            backup_dir: host.path(backup_dir),
            backup_set: BackupSet::new(timestamp),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn backup_set(&self) -> &BackupSet {
        &self.backup_set
    }

    /// Replace the file at `path` with the content `producer` derives from
    /// the current content (`None` when the file does not exist).
    pub async fn mutate<F>(
        &mut self,
        host: &mut Host,
        path: impl AsRef<Path>,
        description: &str,
        producer: F,
    ) -> Result<MutationHandle>
    where
        F: FnOnce(Option<&str>) -> Result<String>,
    {
        let system_path = path.as_ref();
        let target = host.path(system_path);

        let existing = match fs::read(&target).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let existing_text = existing
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        let content = producer(existing_text.as_deref())?;

        if existing.as_deref() == Some(content.as_bytes()) {
            info!("{} already up to date", system_path.display());
            host.record(format!("unchanged: {}", system_path.display()));
            let record = self.backup_set.find(&target).cloned();
            return Ok(MutationHandle {
                path: target,
                record,
                changed: false,
            });
        }

        let record = match existing {
            Some(_) => Some(self.back_up(host, system_path, &target).await?),
            None => {
                self.backup_set.note_created(&target);
                None
            }
        };

        host.record(format!("write: {} ({})", system_path.display(), description));

        if host.is_dry_run() {
            info!("DRY RUN: would write {} ({})", system_path.display(), description);
            debug!("DRY RUN content for {}:\n{}", system_path.display(), content);
            return Ok(MutationHandle {
                path: target,
                record,
                changed: true,
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, content.as_bytes()).await?;
        info!("Wrote {} ({})", system_path.display(), description);

        Ok(MutationHandle {
            path: target,
            record,
            changed: true,
        })
    }

    /// Copy the current file into the backup set, once per path per run
    async fn back_up(&mut self, host: &mut Host, system_path: &Path, target: &Path) -> Result<MutationRecord> {
        if let Some(record) = self.backup_set.find(target) {
            debug!(
                "{} already backed up this run at {}",
                system_path.display(),
                record.backup.display()
            );
            return Ok(record.clone());
        }

        let backup = self.artifact_path(target);
        host.record(format!(
            "backup: {} -> {}",
            system_path.display(),
            backup.display()
        ));

        if host.is_dry_run() {
            info!(
                "DRY RUN: would back up {} to {}",
                system_path.display(),
                backup.display()
            );
        } else {
            fs::create_dir_all(&self.backup_dir).await?;
            fs::copy(target, &backup).await?;
            info!("Backed up {} to {}", system_path.display(), backup.display());
        }

        let record = MutationRecord {
            original: target.to_path_buf(),
            backup,
            timestamp: self.backup_set.timestamp().to_string(),
        };
        self.backup_set.push(record.clone());
        Ok(record)
    }

    /// `<basename>.bak.<timestamp>`, suffixed when the name is taken by this
    /// run or already exists on disk
    fn artifact_path(&self, target: &Path) -> PathBuf {
        let basename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let stem = format!("{}.bak.{}", basename, self.backup_set.timestamp());

        let mut candidate = self.backup_dir.join(&stem);
        let mut n = 1;
        while candidate.exists() || self.backup_set.records().iter().any(|r| r.backup == candidate) {
            candidate = self.backup_dir.join(format!("{}.{}", stem, n));
            n += 1;
        }
        candidate
    }
}
