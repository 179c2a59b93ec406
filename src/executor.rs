// file: src/executor.rs
// version: 1.1.0
// guid: exec0001-2345-6789-abcd-ef0123456789

//! Structured command descriptions and the executors that run them
//!
//! Commands are never assembled as shell strings. A [`CommandSpec`] carries the
//! program, its argument vector and extra environment, so mirror URLs or paths
//! with special characters cannot change the meaning of a command.

use crate::{BaselineError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// A program invocation: program, argument list, extra environment and an
/// optional working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run in `dir`. Not part of the rendered command line.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote a word for POSIX sh, leaving plain words untouched
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into a process error
    pub fn into_result(self, command: &CommandSpec) -> Result<CommandOutput> {
        if self.success() {
            return Ok(self);
        }
        Err(BaselineError::Process {
            command: command.to_string(),
            exit_code: self.exit_code,
            stderr: if self.stderr.trim().is_empty() {
                self.stdout
            } else {
                self.stderr
            },
        })
    }
}

/// Trait for running commands against the host
///
/// Execution blocks until the program exits; there is no timeout.
#[async_trait::async_trait]
pub trait CommandExecutor: Send {
    /// Run a command to completion and capture its output.
    /// Errors only when the program could not be started.
    async fn output(&mut self, command: &CommandSpec) -> Result<CommandOutput>;

    /// Whether a program is available on the host
    fn command_exists(&self, program: &str) -> bool;
}

/// Executor that runs commands on the local machine
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CommandExecutor for LocalExecutor {
    async fn output(&mut self, command: &CommandSpec) -> Result<CommandOutput> {
        debug!("Executing local command: {}", command);

        let mut process = Command::new(command.program());
        process
            .args(command.arguments())
            .envs(command.environment().iter().map(|(k, v)| (k, v)));
        if let Some(dir) = command.working_dir() {
            process.current_dir(dir);
        }

        let output = process
            .output()
            .await
            .map_err(|e| BaselineError::spawn(command.to_string(), e))?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            debug!("Command failed with exit code {:?}", result.exit_code);
            if !result.stderr.trim().is_empty() {
                debug!("STDERR: {}", result.stderr.trim());
            }
        }

        Ok(result)
    }

    fn command_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Executor with scripted outcomes instead of real processes
///
/// Commands whose rendered form starts with a registered prefix fail or
/// answer with canned output; everything else succeeds silently.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    available: HashSet<String>,
    failures: Vec<String>,
    responses: HashMap<String, String>,
    executed: Vec<String>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark programs as installed
    pub fn with_programs<I, S>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available.extend(programs.into_iter().map(Into::into));
        self
    }

    /// Make every command starting with `prefix` exit with status 1
    pub fn fail_on(mut self, prefix: impl Into<String>) -> Self {
        self.failures.push(prefix.into());
        self
    }

    /// Answer commands starting with `prefix` with `stdout`
    pub fn respond(mut self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.insert(prefix.into(), stdout.into());
        self
    }

    /// Commands that reached this executor, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

#[async_trait::async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn output(&mut self, command: &CommandSpec) -> Result<CommandOutput> {
        let rendered = command.to_string();
        self.executed.push(rendered.clone());

        if self.failures.iter().any(|p| rendered.starts_with(p.as_str())) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("scripted failure: {}", rendered),
            });
        }

        let stdout = self
            .responses
            .iter()
            .filter(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }

    fn command_exists(&self, program: &str) -> bool {
        self.available.contains(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_only_when_needed() {
        let cmd = CommandSpec::new("apt-get")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .args(["install", "-y", "curl"]);
        assert_eq!(
            cmd.to_string(),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y curl"
        );
    }

    #[test]
    fn test_shell_quote_escapes_metacharacters() {
        assert_eq!(shell_quote("http://mirror/ubuntu"), "http://mirror/ubuntu");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_into_result_prefers_stderr() {
        let cmd = CommandSpec::new("sshd").arg("-t");
        let output = CommandOutput {
            exit_code: Some(255),
            stdout: "ignored".to_string(),
            stderr: "Bad configuration option".to_string(),
        };
        match output.into_result(&cmd) {
            Err(BaselineError::Process { stderr, exit_code, .. }) => {
                assert_eq!(stderr, "Bad configuration option");
                assert_eq!(exit_code, Some(255));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scripted_executor_failures_and_responses() {
        let mut exec = ScriptedExecutor::new()
            .with_programs(["apt-get"])
            .fail_on("sshd -t")
            .respond("systemctl list-unit-files", "ssh.service enabled enabled\n");

        assert!(exec.command_exists("apt-get"));
        assert!(!exec.command_exists("dnf"));

        let out = exec
            .output(&CommandSpec::new("sshd").arg("-t"))
            .await
            .unwrap();
        assert!(!out.success());

        let out = exec
            .output(&CommandSpec::new("systemctl").arg("list-unit-files"))
            .await
            .unwrap();
        assert!(out.stdout.contains("ssh.service"));
        assert_eq!(exec.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_local_executor_honours_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = CommandSpec::new("pwd").current_dir(dir.path());
        assert_eq!(cmd.to_string(), "pwd");

        let out = LocalExecutor::new().output(&cmd).await.unwrap();

        assert_eq!(
            std::fs::canonicalize(out.stdout.trim()).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_local_executor_reports_exit_code() {
        let mut exec = LocalExecutor::new();
        let out = exec
            .output(&CommandSpec::new("sh").args(["-c", "echo hi; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "hi");
    }
}
