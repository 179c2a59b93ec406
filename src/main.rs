// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! Host Baseline Agent - Main entry point

use clap::Parser;
use host_baseline_agent::{
    cli::{args::Cli, commands::*},
    logging::logger,
};
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            let _ = logger::init_logger(cli.verbose, cli.quiet, None);
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_path = log_path_under(&cli.root, &config);
    if let Err(e) = logger::init_logger(cli.verbose, cli.quiet, Some(log_path.as_path())) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    // Set up signal handling; files already backed up stay restorable
    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = run_command(&cli, config) => match result {
            Ok(RunStatus::Completed(report)) => {
                info!(
                    "Baseline run finished with {} degraded step(s)",
                    report.degraded_steps().count()
                );
                ExitCode::SUCCESS
            }
            Ok(RunStatus::Cancelled) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal => {
            warn!("Interrupted by user; backups taken so far remain in the backup directory");
            std::process::exit(130); // Standard exit code for Ctrl+C
        }
    }
}
