// file: src/orchestrator.rs
// version: 1.1.0
// guid: orchst01-2345-6789-abcd-ef0123456789

//! One ordered baseline run
//!
//! probe, lock, mirrors, package refresh and upgrade, base packages, pip,
//! container runtime, locale and timezone, SSH hardening, rollback, summary.
//! Only an unusable host or a failed SSH syntax check stops a run; every
//! other step degrades and the run carries on. The rollback script is
//! generated after the mutation phase no matter how it ended.

use crate::config::RunConfiguration;
use crate::container::{registry_mirrors_for, ContainerRuntimeInstaller};
use crate::host::{Host, HostProbe, HostProfile};
use crate::locale::LocaleConfigurator;
use crate::lock::RunLock;
use crate::logging::with_operation_span;
use crate::mirror::MirrorConfigurator;
use crate::mutation::{BackupSet, SafeFileMutator};
use crate::packages::PackageManagerAdapter;
use crate::pip::PipMirrorConfigurator;
use crate::rollback::{RollbackArtifacts, RollbackGenerator};
use crate::ssh::{SshHardeningGuard, SshHardeningReport};
use crate::steps::{StepOutcome, StepReport};
use crate::Result;
use tracing::{error, info, warn};

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub profile: HostProfile,
    pub steps: Vec<StepReport>,
    pub ssh: SshHardeningReport,
    pub backups: BackupSet,
    pub rollback: RollbackArtifacts,
    pub dry_run: bool,
}

impl RunReport {
    pub fn degraded_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.outcome.is_degraded())
    }
}

pub struct Orchestrator {
    host: Host,
    config: RunConfiguration,
    timestamp: String,
}

impl Orchestrator {
    pub fn new(host: Host, config: RunConfiguration) -> Self {
        Self {
            host,
            config,
            timestamp: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// Fix the run timestamp used in backup and rollback names
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let dry_run = self.host.is_dry_run();
        info!(
            "Starting baseline run {}{}",
            self.timestamp,
            if dry_run { " (dry run)" } else { "" }
        );

        let profile = with_operation_span("probe", HostProbe::new(&mut self.host).probe()).await?;

        let _lock = if dry_run {
            None
        } else {
            Some(RunLock::acquire(&self.host.path(&self.config.backup_dir))?)
        };

        let mut mutator = SafeFileMutator::new(&self.host, &self.config.backup_dir, &self.timestamp);
        let mut packages = PackageManagerAdapter::for_profile(&profile);
        let mut steps = Vec::new();

        let mutation_result = self
            .mutation_phase(&profile, &mut mutator, &mut packages, &mut steps)
            .await;

        let rollback = with_operation_span(
            "rollback",
            RollbackGenerator::new(&mut self.host).generate(mutator.backup_set(), mutator.backup_dir()),
        )
        .await;

        let ssh = match mutation_result {
            Ok(ssh) => ssh,
            Err(e) => {
                error!("Run aborted: {}", e);
                match &rollback {
                    Ok(artifacts) => error!(
                        "Files changed so far can be restored with {}",
                        artifacts.script.display()
                    ),
                    Err(rollback_err) => error!("Rollback script could not be written: {}", rollback_err),
                }
                return Err(e);
            }
        };
        let rollback = rollback?;

        let report = RunReport {
            profile,
            steps,
            ssh,
            backups: mutator.backup_set().clone(),
            rollback,
            dry_run,
        };
        log_summary(&report);
        Ok(report)
    }

    async fn mutation_phase(
        &mut self,
        profile: &HostProfile,
        mutator: &mut SafeFileMutator,
        packages: &mut PackageManagerAdapter,
        steps: &mut Vec<StepReport>,
    ) -> Result<SshHardeningReport> {
        let config = &self.config;
        let host = &mut self.host;

        let outcome = with_operation_span(
            "mirrors",
            MirrorConfigurator::new(host, mutator, packages).apply(profile, config),
        )
        .await;
        steps.push(soft("package mirrors", outcome));

        let outcome = with_operation_span("upgrade", async {
            packages.ensure_metadata(host).await;
            packages
                .upgrade(host, config.upgrade_packages, config.autoremove)
                .await
        })
        .await;
        steps.push(StepReport::new("package upgrade", outcome));

        let mut base = config.base_packages.clone();
        base.push(packages.manager().ssh_server_package().to_string());
        let outcome = with_operation_span("packages", async {
            if packages.install(host, &base).await {
                StepOutcome::Applied
            } else {
                StepOutcome::degraded("base package install failed")
            }
        })
        .await;
        steps.push(StepReport::new("base packages", outcome));

        let outcome = with_operation_span(
            "pip",
            PipMirrorConfigurator::new(host, mutator, packages).apply(config),
        )
        .await;
        steps.push(soft("pip mirror", outcome));

        if config.install_container_runtime {
            let outcome = with_operation_span("container", async {
                let mut installer = ContainerRuntimeInstaller::new(host, mutator, packages);
                let installed = installer.install().await;
                let mirrored = soft_outcome(
                    "container registry mirror",
                    installer.configure_mirror(&registry_mirrors_for(config)).await,
                );
                installed.merge(mirrored)
            })
            .await;
            steps.push(StepReport::new("container runtime", outcome));
        } else {
            steps.push(StepReport::new(
                "container runtime",
                StepOutcome::skipped("not requested"),
            ));
        }

        let (locale_outcome, timezone_outcome) = with_operation_span("locale", async {
            let mut locale = LocaleConfigurator::new(host, mutator, packages);
            let l = locale.set_locale(&config.locale).await;
            let t = locale.set_timezone(config.timezone.as_deref()).await;
            (l, t)
        })
        .await;
        steps.push(soft("locale", locale_outcome));
        steps.push(StepReport::new("timezone", timezone_outcome));

        let report = with_operation_span(
            "ssh",
            SshHardeningGuard::new(host, mutator).apply(profile, config),
        )
        .await?;
        steps.push(StepReport::new("ssh hardening", report.outcome.clone()));

        Ok(report)
    }
}

/// Turn a step error into a degraded outcome
fn soft_outcome(name: &str, result: Result<StepOutcome>) -> StepOutcome {
    result.unwrap_or_else(|e| {
        warn!("{} failed (continuing): {}", name, e);
        StepOutcome::degraded(e.to_string())
    })
}

fn soft(name: &str, result: Result<StepOutcome>) -> StepReport {
    StepReport::new(name, soft_outcome(name, result))
}

fn log_summary(report: &RunReport) {
    info!("==================== Baseline summary ====================");
    info!(
        "Host: {} {} via {}",
        report.profile.distro_id,
        report.profile.version,
        report.profile.package_manager.as_str()
    );
    for step in &report.steps {
        if step.outcome.is_degraded() {
            warn!("  {:<20} {}", step.name, step.outcome);
        } else {
            info!("  {:<20} {}", step.name, step.outcome);
        }
    }
    info!(
        "  SSH password authentication: {}",
        if report.ssh.decision.password_auth_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    if let Some(warning) = &report.ssh.decision.warning {
        warn!("  {}", warning);
    }
    info!("  Files backed up: {}", report.backups.len());
    if report.rollback.written {
        info!("  Rollback script: {}", report.rollback.script.display());
    } else {
        info!(
            "  Rollback script (not written in dry run): {}",
            report.rollback.script.display()
        );
    }
    let degraded = report.degraded_steps().count();
    if degraded > 0 {
        warn!("{} step(s) did not reach the baseline; see warnings above", degraded);
    }
}
