// file: src/cli/args.rs
// version: 2.1.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use crate::config::{MirrorMode, PipMirrorMode};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "host-baseline-agent")]
#[command(about = "Bring a Linux host to a declared baseline with backed-up, reversible changes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Run unattended: no prompts, supplied or default values only
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Log every intended change without touching the host
    #[arg(long)]
    pub dry_run: bool,

    /// YAML run configuration
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Package mirror mode")]
    pub mirror: Option<MirrorArg>,

    #[arg(long, value_name = "URL", help = "Mirror base URL for --mirror custom")]
    pub mirror_url: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub ssh_port: Option<u32>,

    /// Disable SSH password logins when authorized keys are present
    #[arg(long)]
    pub disable_password_auth: bool,

    /// Disable SSH password logins even without authorized keys
    #[arg(long)]
    pub force_unsafe_ssh: bool,

    #[arg(long, help = "System locale, e.g. en_US.UTF-8")]
    pub locale: Option<String>,

    #[arg(long, help = "Timezone, e.g. Europe/Berlin")]
    pub timezone: Option<String>,

    /// Skip the container runtime
    #[arg(long)]
    pub no_container: bool,

    #[arg(long, value_enum, help = "pip index mirror mode")]
    pub pip_mirror: Option<PipMirrorArg>,

    #[arg(long, value_name = "URL")]
    pub pip_mirror_url: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Where backups and the rollback script go")]
    pub backup_dir: Option<PathBuf>,

    /// Skip package upgrade and autoremove
    #[arg(long)]
    pub no_upgrade: bool,

    /// Filesystem root every system path is resolved against (dry runs only)
    #[arg(long, hide = true, default_value = "/")]
    pub root: PathBuf,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}

/// Mirror mode argument for CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum MirrorArg {
    Default,
    Regional,
    Custom,
}

impl From<MirrorArg> for MirrorMode {
    fn from(mode: MirrorArg) -> Self {
        match mode {
            MirrorArg::Default => MirrorMode::Default,
            MirrorArg::Regional => MirrorMode::Regional,
            MirrorArg::Custom => MirrorMode::Custom,
        }
    }
}

/// pip mirror mode argument for CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PipMirrorArg {
    Auto,
    None,
    Regional,
    Custom,
}

impl From<PipMirrorArg> for PipMirrorMode {
    fn from(mode: PipMirrorArg) -> Self {
        match mode {
            PipMirrorArg::Auto => PipMirrorMode::Auto,
            PipMirrorArg::None => PipMirrorMode::None,
            PipMirrorArg::Regional => PipMirrorMode::Regional,
            PipMirrorArg::Custom => PipMirrorMode::Custom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_flag_set() {
        // Arrange
        let args = [
            "host-baseline-agent",
            "-y",
            "--dry-run",
            "--mirror",
            "custom",
            "--mirror-url",
            "http://mirror.internal/ubuntu",
            "--ssh-port",
            "2222",
            "--disable-password-auth",
            "--pip-mirror",
            "none",
            "--no-container",
        ];

        // Act
        let cli = Cli::try_parse_from(args).unwrap();

        // Assert
        assert!(cli.yes);
        assert!(cli.dry_run);
        assert!(matches!(cli.mirror, Some(MirrorArg::Custom)));
        assert_eq!(cli.ssh_port, Some(2222));
        assert!(cli.disable_password_auth);
        assert!(!cli.force_unsafe_ssh);
        assert!(matches!(cli.pip_mirror, Some(PipMirrorArg::None)));
        assert!(cli.no_container);
        assert_eq!(cli.root, PathBuf::from("/"));
    }

    #[test]
    fn test_unknown_mirror_mode_is_rejected() {
        let result = Cli::try_parse_from(["host-baseline-agent", "--mirror", "fastest"]);
        assert!(result.is_err());
    }
}
