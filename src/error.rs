// file: src/error.rs
// version: 1.0.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, BaselineError>;

/// Error types for the host baseline agent
///
/// Only a handful of these abort a run. Component code absorbs
/// [`BaselineError::Process`] failures and records them as degraded steps.
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Command '{command}' failed (exit code {exit_code:?}): {stderr}")]
    Process {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    #[error("Host identity file not found: {}", .0.display())]
    MissingIdentity(PathBuf),

    #[error(
        "SSH configuration failed its syntax check: {detail}. \
         Inspect {} and restore the original from {backup}",
        .path.display()
    )]
    SshVerification {
        path: PathBuf,
        backup: String,
        detail: String,
    },

    #[error("Another run holds the lock at {}", .0.display())]
    Lock(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BaselineError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new unsupported host error
    pub fn unsupported_host(msg: impl Into<String>) -> Self {
        Self::UnsupportedHost(msg.into())
    }

    /// Create a process error for a command that could not be spawned
    pub fn spawn(command: impl Into<String>, err: std::io::Error) -> Self {
        Self::Process {
            command: command.into(),
            exit_code: None,
            stderr: format!("Failed to execute command: {}", err),
        }
    }

    /// Whether this error must abort the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Process { .. })
    }
}
