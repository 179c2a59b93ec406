// file: src/ssh/mod.rs
// version: 1.1.0
// guid: sshgrd01-2345-6789-abcd-ef0123456789

//! SSH server hardening with lockout protection
//!
//! The guard decides whether password logins may be disabled from the
//! operator's intent and the authorized-keys evidence on the host, writes the
//! managed directives, and verifies the result with `sshd -t` before the
//! daemon is restarted. A failed syntax check is the one fatal outcome of
//! this step: the daemon keeps running its old configuration and the operator
//! is pointed at the backup.

pub mod directives;
pub mod evidence;
pub mod policy;

pub use evidence::{scan_authorized_keys, KeyEvidence};
pub use policy::{resolve_password_auth, PasswordAuthDecision, PasswordAuthIntent};

use crate::config::RunConfiguration;
use crate::error::BaselineError;
use crate::executor::CommandSpec;
use crate::host::{Host, HostProfile};
use crate::mutation::SafeFileMutator;
use crate::steps::StepOutcome;
use crate::Result;
use std::path::PathBuf;
use tracing::{info, warn};

pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
pub const DROP_IN_DIR: &str = "/etc/ssh/sshd_config.d";
/// sshd keeps the first value it reads, so the managed file sorts first
pub const DROP_IN_FILE: &str = "/etc/ssh/sshd_config.d/00-host-baseline.conf";

/// What the guard did
#[derive(Debug, Clone)]
pub struct SshHardeningReport {
    pub decision: PasswordAuthDecision,
    /// System path of the file holding the managed directives
    pub target: Option<PathBuf>,
    pub outcome: StepOutcome,
}

pub struct SshHardeningGuard<'a> {
    host: &'a mut Host,
    mutator: &'a mut SafeFileMutator,
}

impl<'a> SshHardeningGuard<'a> {
    pub fn new(host: &'a mut Host, mutator: &'a mut SafeFileMutator) -> Self {
        Self { host, mutator }
    }

    pub async fn apply(&mut self, profile: &HostProfile, config: &RunConfiguration) -> Result<SshHardeningReport> {
        let intent = PasswordAuthIntent::from_flags(config.disable_password_auth, config.force_unsafe_ssh);
        let evidence = scan_authorized_keys(self.host).await;
        let decision = resolve_password_auth(intent, evidence.has_authorized_keys());
        info!(
            "Password authentication: intent {:?}, {} authorized_keys file(s) found, enabled = {}",
            intent,
            evidence.key_files.len(),
            decision.password_auth_enabled
        );
        if let Some(warning) = &decision.warning {
            warn!("{}", warning);
        }

        if !self.host.has_program("sshd") {
            warn!("No sshd binary found; SSH hardening skipped");
            return Ok(SshHardeningReport {
                decision,
                target: None,
                outcome: StepOutcome::skipped("sshd not installed"),
            });
        }

        let managed = directives::managed_directives(config.port(), decision.password_auth_enabled);
        let target = self.choose_target(&managed).await;
        let description = format!("ssh hardening (port {})", config.port());

        let handle = if target == DROP_IN_FILE {
            let content = directives::render_drop_in(&managed);
            self.mutator
                .mutate(self.host, DROP_IN_FILE, &description, |_| Ok(content))
                .await?
        } else {
            self.mutator
                .mutate(self.host, SSHD_CONFIG, &description, |existing| {
                    Ok(directives::merge_main_config(existing.unwrap_or_default(), &managed))
                })
                .await?
        };

        if let Err(e) = self
            .host
            .run("Verifying SSH configuration", CommandSpec::new("sshd").arg("-t"))
            .await
        {
            return Err(BaselineError::SshVerification {
                path: PathBuf::from(target),
                backup: handle.backup_hint(),
                detail: e.to_string(),
            });
        }

        let unit = profile.ssh_service.as_str();
        let mut outcome = if handle.changed {
            StepOutcome::Applied
        } else {
            StepOutcome::Unchanged
        };
        if handle.changed
            && !self
                .host
                .run_tolerant(
                    "Restarting SSH service",
                    CommandSpec::new("systemctl").args(["restart", unit]),
                )
                .await
        {
            outcome = StepOutcome::degraded(format!("{} restart failed", unit));
        }
        self.host
            .run_tolerant(
                "Enabling SSH service",
                CommandSpec::new("systemctl").args(["enable", unit]),
            )
            .await;

        if decision.downgraded {
            outcome = outcome.merge(StepOutcome::degraded(
                "password authentication kept enabled (no authorized keys)",
            ));
        }

        Ok(SshHardeningReport {
            decision,
            target: Some(PathBuf::from(target)),
            outcome,
        })
    }

    /// Drop-in when the directory exists and the main file includes it
    /// ahead of any managed keyword
    async fn choose_target(&self, managed: &[directives::Directive]) -> &'static str {
        if !self.host.path(DROP_IN_DIR).is_dir() {
            return SSHD_CONFIG;
        }
        let main = self.host.read_file(SSHD_CONFIG).await.unwrap_or_default();
        if directives::drop_in_takes_effect(&main, managed) {
            DROP_IN_FILE
        } else {
            warn!(
                "{} does not include {} before its own settings; merging into the main file",
                SSHD_CONFIG, DROP_IN_DIR
            );
            SSHD_CONFIG
        }
    }
}
