// file: src/host/mod.rs
// version: 1.0.0
// guid: host0001-2345-6789-abcd-ef0123456789

//! The host being baselined
//!
//! [`Host`] owns the command executor, the filesystem root that every system
//! path is resolved against, the dry-run switch and the action journal. Every
//! side effect of a run passes through here, which is what makes a dry run
//! produce the same journal as a real one.

pub mod probe;

pub use probe::{HostProbe, HostProfile};

use crate::executor::{CommandExecutor, CommandOutput, CommandSpec, LocalExecutor};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Host {
    root: PathBuf,
    dry_run: bool,
    executor: Box<dyn CommandExecutor>,
    journal: Vec<String>,
}

impl Host {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            root: root.into(),
            dry_run,
            executor,
            journal: Vec::new(),
        }
    }

    /// Host backed by real processes on this machine
    pub fn local(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self::new(root, dry_run, Box::new(LocalExecutor::new()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Resolve an absolute system path against the filesystem root
    pub fn path(&self, system_path: impl AsRef<Path>) -> PathBuf {
        let system_path = system_path.as_ref();
        let relative = system_path.strip_prefix("/").unwrap_or(system_path);
        self.root.join(relative)
    }

    pub fn exists(&self, system_path: impl AsRef<Path>) -> bool {
        self.path(system_path).exists()
    }

    /// Read a system file, `None` if it is absent or unreadable
    pub async fn read_file(&self, system_path: impl AsRef<Path>) -> Option<String> {
        tokio::fs::read_to_string(self.path(system_path)).await.ok()
    }

    pub fn has_program(&self, program: &str) -> bool {
        self.executor.command_exists(program)
    }

    /// Ordered record of every intended action so far
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.journal.push(entry.into());
    }

    /// Run a side-effecting command. Dry runs log it and report success.
    pub async fn run(&mut self, step: &str, command: CommandSpec) -> Result<()> {
        info!("Executing: {} -> {}", step, command);
        self.record(format!("run: {}", command));

        if self.dry_run {
            info!("DRY RUN: would execute {}", command);
            return Ok(());
        }

        self.executor.output(&command).await?.into_result(&command)?;
        debug!("Command '{}' completed successfully", step);
        Ok(())
    }

    /// Run a command whose failure is logged and absorbed
    pub async fn run_tolerant(&mut self, step: &str, command: CommandSpec) -> bool {
        match self.run(step, command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} failed (continuing): {}", step, e);
                false
            }
        }
    }

    /// Run a read-only command. Queries execute in dry runs as well.
    pub async fn query(&mut self, command: CommandSpec) -> Result<CommandOutput> {
        debug!("Querying: {}", command);
        self.record(format!("query: {}", command));
        self.executor.output(&command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;

    #[test]
    fn test_path_is_resolved_under_root() {
        let host = Host::new("/tmp/root", false, Box::new(ScriptedExecutor::new()));
        assert_eq!(
            host.path("/etc/ssh/sshd_config"),
            PathBuf::from("/tmp/root/etc/ssh/sshd_config")
        );
        assert_eq!(host.path("etc/hosts"), PathBuf::from("/tmp/root/etc/hosts"));
    }

    #[tokio::test]
    async fn test_dry_run_skips_execution_but_journals() {
        let mut host = Host::new("/", true, Box::new(ScriptedExecutor::new().fail_on("false")));

        // Would fail for real; dry run never reaches the executor
        host.run("Failing step", CommandSpec::new("false")).await.unwrap();

        assert_eq!(host.journal(), ["run: false"]);
    }

    #[tokio::test]
    async fn test_run_tolerant_absorbs_failure() {
        let mut host = Host::new("/", false, Box::new(ScriptedExecutor::new().fail_on("systemctl")));

        let ok = host
            .run_tolerant("Restarting ssh", CommandSpec::new("systemctl").args(["restart", "ssh"]))
            .await;

        assert!(!ok);
        assert_eq!(host.journal().len(), 1);
    }
}
