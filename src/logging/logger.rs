// file: src/logging/logger.rs
// version: 2.0.0
// guid: j0k1l2m3-n4o5-6789-0123-456789jklmno

//! Logger initialization and configuration

use crate::error::BaselineError;
use crate::Result;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::Instrument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn level_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Initialize logging to stdout and, when `log_path` can be opened, to an
/// ANSI-free log file appended across runs. Returns whether the file layer
/// is active.
pub fn init_logger(verbose: bool, quiet: bool, log_path: Option<&Path>) -> Result<bool> {
    let mut open_error = None;
    let file = log_path.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(file),
        Err(e) => {
            open_error = Some((path.to_path_buf(), e));
            None
        }
    });
    let file_active = file.is_some();

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stdout)
        .compact()
        .with_filter(level_filter(verbose, quiet));

    // The file always gets at least info, even in quiet mode
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .with_filter(level_filter(verbose, false))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BaselineError::config(format!("Failed to initialize logger: {}", e)))?;

    match (open_error, log_path) {
        (Some((path, e)), _) => tracing::warn!(
            "Cannot open log file {} ({}); logging to stdout only",
            path.display(),
            e
        ),
        (None, Some(path)) => tracing::debug!("Logging to stdout and {}", path.display()),
        (None, None) => {}
    }

    Ok(file_active)
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Run a step future inside a named span
pub async fn with_operation_span<Fut>(operation: &str, fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    let span = tracing::info_span!("step", name = operation);
    fut.instrument(span).await
}
