// file: src/cli/commands.rs
// version: 2.1.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Command implementations for CLI

use super::args::Cli;
use super::prompt::{Prompter, TerminalPrompter, UnattendedPrompter};
use crate::config::loader::ConfigLoader;
use crate::config::validator::{validate_config, validate_port};
use crate::config::{MirrorMode, RunConfiguration};
use crate::host::Host;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::{BaselineError, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How an invocation ended without error
#[derive(Debug)]
pub enum RunStatus {
    Completed(Box<RunReport>),
    /// The operator declined at the final confirmation
    Cancelled,
}

/// Load the configuration file and apply command line overrides
pub fn resolve_configuration(cli: &Cli) -> Result<RunConfiguration> {
    let mut config = ConfigLoader::new().load(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

/// Flags win over the configuration file
pub fn apply_overrides(config: &mut RunConfiguration, cli: &Cli) {
    if let Some(mode) = cli.mirror {
        config.mirror_mode = mode.into();
    }
    if let Some(url) = &cli.mirror_url {
        config.custom_mirror_url = Some(url.clone());
        if cli.mirror.is_none() {
            config.mirror_mode = MirrorMode::Custom;
        }
    }
    if let Some(port) = cli.ssh_port {
        config.ssh_port = port;
    }
    config.disable_password_auth |= cli.disable_password_auth;
    config.force_unsafe_ssh |= cli.force_unsafe_ssh;
    if let Some(locale) = &cli.locale {
        config.locale = locale.clone();
    }
    if let Some(tz) = &cli.timezone {
        config.timezone = Some(tz.clone());
    }
    if cli.no_container {
        config.install_container_runtime = false;
    }
    if let Some(mode) = cli.pip_mirror {
        config.pip_mirror = mode.into();
    }
    if let Some(url) = &cli.pip_mirror_url {
        config.pip_mirror_url = Some(url.clone());
    }
    if let Some(path) = &cli.log_file {
        config.log_path = path.clone();
    }
    if let Some(dir) = &cli.backup_dir {
        config.backup_dir = dir.clone();
    }
    if cli.no_upgrade {
        config.upgrade_packages = false;
        config.autoremove = false;
    }
    config.unattended |= cli.yes;
    config.dry_run |= cli.dry_run;
}

/// Log file location under the filesystem root
pub fn log_path_under(root: &Path, config: &RunConfiguration) -> PathBuf {
    let relative = config
        .log_path
        .strip_prefix("/")
        .unwrap_or(&config.log_path);
    root.join(relative)
}

/// Ask for the choices not already fixed. Returns false if the operator
/// declines the final confirmation.
pub fn gather_intent(config: &mut RunConfiguration, prompter: &mut dyn Prompter) -> Result<bool> {
    let port = prompter.ask("SSH port", &config.ssh_port.to_string())?;
    let port: u32 = port
        .parse()
        .map_err(|_| BaselineError::validation(format!("SSH port must be a number, got '{}'", port)))?;
    validate_port(port)?;
    config.ssh_port = port;

    if !config.disable_password_auth {
        config.disable_password_auth =
            prompter.confirm("Disable SSH password authentication (only if keys are installed)?", false)?;
    }
    config.install_container_runtime =
        prompter.confirm("Install a container runtime?", config.install_container_runtime)?;

    let summary = format!(
        "Apply baseline (mirror {}, ssh port {}, password auth {}, container runtime {}){}?",
        config.mirror_mode.as_str(),
        config.ssh_port,
        if config.disable_password_auth {
            "off if safe"
        } else {
            "unchanged"
        },
        if config.install_container_runtime { "yes" } else { "no" },
        if config.dry_run { " as a dry run" } else { "" }
    );
    prompter.confirm(&summary, true)
}

/// Validate, gather intent and run the baseline against `root`
pub async fn run_command(cli: &Cli, mut config: RunConfiguration) -> Result<RunStatus> {
    validate_config(&config)?;

    // commands act on the live host whatever --root says
    if !config.dry_run && cli.root != Path::new("/") {
        return Err(BaselineError::validation(format!(
            "--root {} is only supported with --dry-run",
            cli.root.display()
        )));
    }
    if !config.dry_run && !is_root() {
        return Err(BaselineError::validation(
            "changing the host must be run as root (use --dry-run to preview)",
        ));
    }

    let interactive = !config.unattended && std::io::stdin().is_terminal();
    if !config.unattended && !interactive {
        warn!("Standard input is not a terminal; continuing with supplied and default values");
    }

    let proceed = if interactive {
        gather_intent(&mut config, &mut TerminalPrompter::stdio())?
    } else {
        gather_intent(&mut config, &mut UnattendedPrompter)?
    };
    if !proceed {
        info!("Cancelled by operator; nothing was changed");
        return Ok(RunStatus::Cancelled);
    }

    let host = Host::local(&cli.root, config.dry_run);
    let report = Orchestrator::new(host, config).run().await?;
    Ok(RunStatus::Completed(Box::new(report)))
}

/// Check if running as root
fn is_root() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
