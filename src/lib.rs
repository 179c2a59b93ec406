// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # Host Baseline Agent
//!
//! Brings a freshly installed or drifted Linux host to a declared baseline in
//! one ordered pass: package mirrors, base packages, a container runtime, SSH
//! hardening, locale and timezone.
//!
//! Every system file is backed up before it is written and a standalone
//! rollback script is generated at the end of each run. Disabling SSH
//! password logins is refused unless the host shows evidence of working key
//! access.

pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod executor;
pub mod host;
pub mod locale;
pub mod lock;
pub mod logging;
pub mod mirror;
pub mod mutation;
pub mod orchestrator;
pub mod packages;
pub mod pip;
pub mod rollback;
pub mod ssh;
pub mod steps;

pub use error::{BaselineError, Result};

/// Version information for the agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
