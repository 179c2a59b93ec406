// file: src/rollback.rs
// version: 1.1.0
// guid: rollbk01-2345-6789-abcd-ef0123456789

//! Standalone rollback script generation
//!
//! The script is written next to the backups it restores and references them
//! by path, so the backup directory has to outlive it.

use crate::executor::shell_quote;
use crate::host::Host;
use crate::mutation::BackupSet;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Files produced for one run
#[derive(Debug, Clone)]
pub struct RollbackArtifacts {
    pub script: PathBuf,
    pub manifest: PathBuf,
    /// False in dry runs, where nothing is written
    pub written: bool,
}

pub struct RollbackGenerator<'a> {
    host: &'a mut Host,
}

impl<'a> RollbackGenerator<'a> {
    pub fn new(host: &'a mut Host) -> Self {
        Self { host }
    }

    /// Write `rollback-<ts>.sh` and `manifest-<ts>.json` into `backup_dir`.
    /// Called once per run, after the last mutation step.
    pub async fn generate(&mut self, backup_set: &BackupSet, backup_dir: &Path) -> Result<RollbackArtifacts> {
        let script = backup_dir.join(format!("rollback-{}.sh", backup_set.timestamp()));
        let manifest = backup_dir.join(format!("manifest-{}.json", backup_set.timestamp()));
        let content = render_script(backup_set);

        self.host
            .record(format!("rollback: {} ({} files)", script.display(), backup_set.len()));

        if self.host.is_dry_run() {
            info!(
                "DRY RUN: would write rollback script {} restoring {} files",
                script.display(),
                backup_set.len()
            );
            debug!("DRY RUN rollback script:\n{}", content);
            return Ok(RollbackArtifacts {
                script,
                manifest,
                written: false,
            });
        }

        fs::create_dir_all(backup_dir).await?;
        fs::write(&script, content).await?;
        set_executable(&script).await?;
        fs::write(&manifest, serde_json::to_string_pretty(backup_set)?).await?;

        info!(
            "Rollback script written to {} ({} files)",
            script.display(),
            backup_set.len()
        );
        Ok(RollbackArtifacts {
            script,
            manifest,
            written: true,
        })
    }
}

/// Render a POSIX sh script restoring every record, newest first
pub fn render_script(backup_set: &BackupSet) -> String {
    let mut script = String::new();
    script.push_str("#!/bin/sh\n");
    script.push_str(&format!(
        "# Rollback for host-baseline-agent run {}\n",
        backup_set.timestamp()
    ));
    script.push_str("# Restores every file backed up during that run. Takes no arguments.\n");
    script.push_str("set -u\n\n");
    script.push_str("status=0\n\n");
    script.push_str(
        r#"restore() {
    if [ ! -f "$1" ]; then
        echo "missing backup $1, not restoring $2" >&2
        status=1
        return
    fi
    mkdir -p "$(dirname "$2")" && cp -p "$1" "$2" && echo "restored $2" || status=1
}
"#,
    );
    script.push('\n');

    if !backup_set.created().is_empty() {
        script.push_str("# Created by that run and NOT removed by this script; delete by hand if unwanted:\n");
        for path in backup_set.created() {
            script.push_str(&format!("#   {}\n", path.to_string_lossy().replace('\n', "?")));
        }
        script.push('\n');
    }

    for record in backup_set.records().iter().rev() {
        script.push_str(&format!(
            "restore {} {}\n",
            shell_quote(&record.backup.to_string_lossy()),
            shell_quote(&record.original.to_string_lossy())
        ));
    }

    script.push_str("\nexit $status\n");
    script
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
