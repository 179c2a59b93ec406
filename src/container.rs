// file: src/container.rs
// version: 1.1.0
// guid: contnr01-2345-6789-abcd-ef0123456789

//! Container engine install and registry mirror configuration

use crate::config::{MirrorMode, RunConfiguration};
use crate::executor::CommandSpec;
use crate::host::Host;
use crate::mutation::SafeFileMutator;
use crate::packages::PackageManagerAdapter;
use crate::steps::StepOutcome;
use crate::Result;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const DAEMON_CONFIG: &str = "/etc/docker/daemon.json";
pub const VENDOR_INSTALL_URL: &str = "https://get.docker.com";
/// Script name inside the private download directory
const VENDOR_SCRIPT: &str = "get-docker.sh";
const MIRRORS_KEY: &str = "registry-mirrors";

/// How a daemon configuration was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// No usable file existed; a fresh object was written
    Created,
    /// Parsed and merged as JSON
    Structured,
    /// Text substitution on a file that does not parse as JSON
    TextFallback,
}

pub struct ContainerRuntimeInstaller<'a> {
    host: &'a mut Host,
    mutator: &'a mut SafeFileMutator,
    packages: &'a mut PackageManagerAdapter,
}

impl<'a> ContainerRuntimeInstaller<'a> {
    pub fn new(
        host: &'a mut Host,
        mutator: &'a mut SafeFileMutator,
        packages: &'a mut PackageManagerAdapter,
    ) -> Self {
        Self {
            host,
            mutator,
            packages,
        }
    }

    /// Vendor bootstrap first, then native packages. Never fails the run.
    pub async fn install(&mut self) -> StepOutcome {
        if self.host.has_program("docker") {
            info!("Container runtime already installed");
            return StepOutcome::Unchanged;
        }

        let installed = if self.install_from_vendor_script().await {
            true
        } else {
            warn!("Vendor install script failed; falling back to distribution packages");
            let candidates = self.packages.manager().container_packages();
            match self
                .packages
                .install_first_available(self.host, candidates)
                .await
            {
                Some(pkg) => {
                    info!("Installed container runtime from package {}", pkg);
                    true
                }
                None => false,
            }
        };

        if !installed {
            warn!("Container runtime could not be installed; continuing without it");
            return StepOutcome::degraded("container runtime not installed");
        }

        self.host
            .run_tolerant(
                "Enabling container runtime",
                CommandSpec::new("systemctl").args(["enable", "--now", "docker"]),
            )
            .await;
        StepOutcome::Applied
    }

    /// Download and run the vendor script from a private directory that is
    /// removed when this returns
    async fn install_from_vendor_script(&mut self) -> bool {
        let scratch = match tempfile::Builder::new().prefix("host-baseline-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Cannot create a private directory for the vendor install script: {}", e);
                return false;
            }
        };

        let download = CommandSpec::new("curl")
            .args(["-fsSL", VENDOR_INSTALL_URL, "-o", VENDOR_SCRIPT])
            .current_dir(scratch.path());
        if !self
            .host
            .run_tolerant("Downloading vendor install script", download)
            .await
        {
            return false;
        }
        self.host
            .run_tolerant(
                "Running vendor install script",
                CommandSpec::new("sh")
                    .arg(VENDOR_SCRIPT)
                    .current_dir(scratch.path()),
            )
            .await
    }

    /// Merge `registry-mirrors` into the daemon configuration
    pub async fn configure_mirror(&mut self, mirrors: &[String]) -> Result<StepOutcome> {
        if mirrors.is_empty() {
            info!("No registry mirrors requested");
            return Ok(StepOutcome::skipped("no registry mirrors"));
        }

        let mut strategy = MergeStrategy::Created;
        let mut unmergeable = false;
        let handle = self
            .mutator
            .mutate(self.host, DAEMON_CONFIG, "registry mirrors", |existing| {
                match merge_registry_mirrors(existing, mirrors) {
                    Some((content, used)) => {
                        strategy = used;
                        Ok(content)
                    }
                    None => {
                        unmergeable = true;
                        Ok(existing.unwrap_or_default().to_string())
                    }
                }
            })
            .await?;

        if unmergeable {
            warn!(
                "{} is neither JSON nor a recognisable object; registry mirrors NOT configured",
                DAEMON_CONFIG
            );
            return Ok(StepOutcome::degraded("daemon.json could not be merged"));
        }
        if strategy == MergeStrategy::TextFallback {
            warn!(
                "{} is not valid JSON; registry mirrors applied by text substitution",
                DAEMON_CONFIG
            );
        }
        if !handle.changed {
            return Ok(StepOutcome::Unchanged);
        }

        self.host
            .run_tolerant(
                "Reloading service manager",
                CommandSpec::new("systemctl").arg("daemon-reload"),
            )
            .await;
        let restarted = self
            .host
            .run_tolerant(
                "Restarting container runtime",
                CommandSpec::new("systemctl").args(["restart", "docker"]),
            )
            .await;

        Ok(if restarted {
            StepOutcome::Applied
        } else {
            StepOutcome::degraded("container runtime restart failed")
        })
    }
}

/// Registry mirrors implied by the configuration
pub fn registry_mirrors_for(config: &RunConfiguration) -> Vec<String> {
    match config.mirror_mode {
        MirrorMode::Default => Vec::new(),
        MirrorMode::Regional => vec![config.mirrors.registry.clone()],
        MirrorMode::Custom => config.registry_mirrors.clone(),
    }
}

/// Produce daemon configuration text with exactly one `registry-mirrors` key.
/// `None` when the existing text cannot be merged safely.
pub fn merge_registry_mirrors(existing: Option<&str>, mirrors: &[String]) -> Option<(String, MergeStrategy)> {
    let mirrors_value = Value::Array(mirrors.iter().cloned().map(Value::String).collect());

    let existing = existing.filter(|text| !text.trim().is_empty());
    let Some(text) = existing else {
        let mut object = Map::new();
        object.insert(MIRRORS_KEY.to_string(), mirrors_value);
        return Some((render(&Value::Object(object)), MergeStrategy::Created));
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut object)) => {
            object.insert(MIRRORS_KEY.to_string(), mirrors_value);
            Some((render(&Value::Object(object)), MergeStrategy::Structured))
        }
        Ok(_) => None,
        Err(_) => substitute_registry_mirrors(text, &mirrors_value.to_string())
            .map(|content| (content, MergeStrategy::TextFallback)),
    }
}

fn render(value: &Value) -> String {
    // Map values always serialize
    serde_json::to_string_pretty(value).unwrap_or_default() + "\n"
}

/// Replace an existing `registry-mirrors` array in place, or insert the key
/// before the final closing brace
fn substitute_registry_mirrors(text: &str, array: &str) -> Option<String> {
    let entry = format!("\"{}\": {}", MIRRORS_KEY, array);
    let existing = Regex::new(r#""registry-mirrors"\s*:\s*\[[^\]]*\]"#).ok()?;

    if existing.is_match(text) {
        return Some(existing.replacen(text, 1, entry.as_str()).into_owned());
    }

    let close = text.rfind('}')?;
    let body = text[..close].trim_end();
    if !body.contains('{') {
        return None;
    }
    let separator = if body.ends_with('{') || body.ends_with(',') { "" } else { "," };
    Some(format!(
        "{}{}\n  {}\n{}",
        body,
        separator,
        entry,
        &text[close..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandExecutor, CommandOutput, ScriptedExecutor};
    use crate::packages::PackageManager;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn mirrors(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let existing = r#"{"log-driver": "json-file", "registry-mirrors": ["https://old"], "data-root": "/srv/docker"}"#;

        let (content, strategy) =
            merge_registry_mirrors(Some(existing), &mirrors(&["https://a", "https://b"])).unwrap();

        assert_eq!(strategy, MergeStrategy::Structured);
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["log-driver"], "json-file");
        assert_eq!(value["data-root"], "/srv/docker");
        assert_eq!(value["registry-mirrors"], serde_json::json!(["https://a", "https://b"]));
        assert_eq!(content.matches("registry-mirrors").count(), 1);

        // Key order is kept
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["log-driver", "registry-mirrors", "data-root"]);
    }

    #[test]
    fn test_merge_creates_fresh_object() {
        let (content, strategy) = merge_registry_mirrors(None, &mirrors(&["https://a"])).unwrap();
        assert_eq!(strategy, MergeStrategy::Created);
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, serde_json::json!({"registry-mirrors": ["https://a"]}));

        let (_, strategy) = merge_registry_mirrors(Some("  \n"), &mirrors(&["https://a"])).unwrap();
        assert_eq!(strategy, MergeStrategy::Created);
    }

    #[test]
    fn test_text_fallback_replaces_existing_array() {
        // Trailing comma makes this invalid JSON
        let existing = "{\n  \"registry-mirrors\": [\"https://old\"],\n  \"debug\": true,\n}\n";

        let (content, strategy) = merge_registry_mirrors(Some(existing), &mirrors(&["https://new"])).unwrap();

        assert_eq!(strategy, MergeStrategy::TextFallback);
        assert!(content.contains(r#""registry-mirrors": ["https://new"]"#));
        assert!(!content.contains("https://old"));
        assert!(content.contains("\"debug\": true"));
    }

    #[test]
    fn test_text_fallback_inserts_before_closing_brace() {
        let existing = "{\n  // hand edited\n  \"debug\": true\n}\n";

        let (content, _) = merge_registry_mirrors(Some(existing), &mirrors(&["https://new"])).unwrap();

        assert_eq!(
            content,
            "{\n  // hand edited\n  \"debug\": true,\n  \"registry-mirrors\": [\"https://new\"]\n}\n"
        );
    }

    #[test]
    fn test_unmergeable_content() {
        assert!(merge_registry_mirrors(Some("[1, 2]"), &mirrors(&["https://a"])).is_none());
        assert!(merge_registry_mirrors(Some("garbage"), &mirrors(&["https://a"])).is_none());
    }

    #[test]
    fn test_registry_mirrors_for_modes() {
        let mut config = RunConfiguration::default();
        assert!(registry_mirrors_for(&config).is_empty());

        config.mirror_mode = MirrorMode::Regional;
        assert_eq!(registry_mirrors_for(&config), vec![config.mirrors.registry.clone()]);

        config.mirror_mode = MirrorMode::Custom;
        config.registry_mirrors = mirrors(&["https://r.internal"]);
        assert_eq!(registry_mirrors_for(&config), mirrors(&["https://r.internal"]));
    }

    #[tokio::test]
    async fn test_install_falls_back_to_native_packages() {
        let root = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new()
            .fail_on("curl")
            .fail_on("DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends docker.io");
        let mut host = Host::new(root.path(), false, Box::new(exec));
        let mut mutator = SafeFileMutator::new(&host, "/backups", "20240101_000000");
        let mut packages = PackageManagerAdapter::new(PackageManager::Apt, None);

        let outcome = ContainerRuntimeInstaller::new(&mut host, &mut mutator, &mut packages)
            .install()
            .await;

        assert_eq!(outcome, StepOutcome::Applied);
        let journal = host.journal();
        assert!(journal[0].starts_with("run: curl"));
        assert!(journal[1].ends_with("docker.io"));
        assert!(journal[2].ends_with("docker-ce"));
        assert_eq!(journal[3], "run: systemctl enable --now docker");
    }

    /// Keeps every command it is handed
    struct Capture(Arc<Mutex<Vec<CommandSpec>>>);

    #[async_trait::async_trait]
    impl CommandExecutor for Capture {
        async fn output(&mut self, command: &CommandSpec) -> Result<CommandOutput> {
            self.0.lock().unwrap().push(command.clone());
            Ok(CommandOutput {
                exit_code: Some(0),
                ..Default::default()
            })
        }

        fn command_exists(&self, _program: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_vendor_script_runs_from_private_directory() {
        // Arrange
        let root = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new(root.path(), false, Box::new(Capture(seen.clone())));
        let mut mutator = SafeFileMutator::new(&host, "/backups", "20240101_000000");
        let mut packages = PackageManagerAdapter::new(PackageManager::Apt, None);

        // Act
        let outcome = ContainerRuntimeInstaller::new(&mut host, &mut mutator, &mut packages)
            .install()
            .await;

        // Assert
        assert_eq!(outcome, StepOutcome::Applied);
        let seen = seen.lock().unwrap();
        let (download, run) = (&seen[0], &seen[1]);
        assert_eq!(download.program(), "curl");
        assert_eq!(run.arguments(), ["get-docker.sh"]);

        let dir = download.working_dir().expect("download directory");
        assert_eq!(run.working_dir(), Some(dir));
        assert_ne!(dir, std::env::temp_dir());
        assert!(dir.starts_with(std::env::temp_dir()));
        // removed once the install finished
        assert!(!dir.exists());
        assert!(!host.journal().iter().any(|e| e.contains("/tmp/")));
    }

    #[tokio::test]
    async fn test_total_install_failure_is_degraded() {
        let root = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new().fail_on("curl").fail_on("DEBIAN_FRONTEND");
        let mut host = Host::new(root.path(), false, Box::new(exec));
        let mut mutator = SafeFileMutator::new(&host, "/backups", "20240101_000000");
        let mut packages = PackageManagerAdapter::new(PackageManager::Apt, None);

        let outcome = ContainerRuntimeInstaller::new(&mut host, &mut mutator, &mut packages)
            .install()
            .await;

        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_configure_mirror_backs_up_and_restarts() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc/docker")).unwrap();
        std::fs::write(root.path().join("etc/docker/daemon.json"), r#"{"debug": true}"#).unwrap();
        let mut host = Host::new(root.path(), false, Box::new(ScriptedExecutor::new()));
        let mut mutator = SafeFileMutator::new(&host, "/backups", "20240101_000000");
        let mut packages = PackageManagerAdapter::new(PackageManager::Apt, None);

        let outcome = ContainerRuntimeInstaller::new(&mut host, &mut mutator, &mut packages)
            .configure_mirror(&mirrors(&["https://m.example"]))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(mutator.backup_set().len(), 1);
        assert_eq!(host.journal().last().unwrap(), "run: systemctl restart docker");
    }
}
