// file: src/packages/adapter.rs
// version: 1.1.0
// guid: pkgadp01-2345-6789-abcd-ef0123456789

//! Best-effort package operations on top of a [`PackageManager`] backend

use super::PackageManager;
use crate::host::{Host, HostProfile};
use crate::steps::StepOutcome;
use tracing::{debug, info, warn};

/// Uniform package operations for every installer in a run
///
/// Failures never abort the run: a missing package degrades the host but the
/// steps after it are independent and still worth doing.
pub struct PackageManagerAdapter {
    manager: PackageManager,
    prerequisite: Option<&'static str>,
    prerequisite_attempted: bool,
    metadata_current: bool,
}

impl PackageManagerAdapter {
    pub fn new(manager: PackageManager, major_version: Option<u32>) -> Self {
        Self {
            manager,
            prerequisite: manager.prerequisite_repository(major_version),
            prerequisite_attempted: false,
            metadata_current: false,
        }
    }

    pub fn for_profile(profile: &HostProfile) -> Self {
        Self::new(profile.package_manager, profile.major_version())
    }

    pub fn manager(&self) -> PackageManager {
        self.manager
    }

    /// Refresh package metadata. Failure is common on restricted networks and
    /// is only logged at debug level.
    pub async fn refresh_metadata(&mut self, host: &mut Host) -> bool {
        match host
            .run("Refreshing package metadata", self.manager.refresh_command())
            .await
        {
            Ok(()) => self.metadata_current = true,
            Err(e) => {
                debug!("Metadata refresh failed (ignored): {}", e);
                self.metadata_current = false;
            }
        }
        self.metadata_current
    }

    /// Refresh unless an earlier step already did so successfully
    pub async fn ensure_metadata(&mut self, host: &mut Host) -> bool {
        if self.metadata_current {
            debug!("Package metadata already refreshed this run");
            return true;
        }
        self.refresh_metadata(host).await
    }

    /// Upgrade installed packages and drop unused ones, as requested
    pub async fn upgrade(&mut self, host: &mut Host, upgrade: bool, autoremove: bool) -> StepOutcome {
        if !upgrade && !autoremove {
            return StepOutcome::skipped("upgrade and autoremove not requested");
        }

        let mut outcome = StepOutcome::Applied;

        if upgrade
            && !host
                .run_tolerant("Upgrading packages", self.manager.upgrade_command())
                .await
        {
            outcome = StepOutcome::degraded("package upgrade failed");
        }

        if autoremove {
            outcome = outcome.merge(self.autoremove(host).await);
        }

        outcome
    }

    async fn autoremove(&mut self, host: &mut Host) -> StepOutcome {
        if let Some(cmd) = self.manager.autoremove_command() {
            return match host.run_tolerant("Removing unused packages", cmd).await {
                true => StepOutcome::Applied,
                false => StepOutcome::degraded("autoremove failed"),
            };
        }

        let Some(query) = self.manager.orphan_query() else {
            info!("{} has no autoremove operation; skipping", self.manager.as_str());
            return StepOutcome::Applied;
        };

        // pacman -Qdtq exits non-zero when there are no orphans
        let orphans: Vec<String> = match host.query(query).await {
            Ok(output) => output
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                debug!("Orphan query failed: {}", e);
                Vec::new()
            }
        };

        if orphans.is_empty() {
            debug!("No orphaned packages");
            return StepOutcome::Applied;
        }

        match host
            .run_tolerant("Removing orphaned packages", self.manager.remove_command(&orphans))
            .await
        {
            true => StepOutcome::Applied,
            false => StepOutcome::degraded("orphan removal failed"),
        }
    }

    /// Install a set of packages. Returns false when the install failed.
    pub async fn install(&mut self, host: &mut Host, packages: &[String]) -> bool {
        let mut unique: Vec<String> = Vec::new();
        for pkg in packages {
            let pkg = pkg.trim();
            if !pkg.is_empty() && !unique.iter().any(|p| p == pkg) {
                unique.push(pkg.to_string());
            }
        }

        if unique.is_empty() {
            debug!("Nothing to install");
            return true;
        }

        self.ensure_prerequisite(host).await;

        let step = format!("Installing {}", unique.join(" "));
        host.run_tolerant(&step, self.manager.install_command(&unique)).await
    }

    /// Install the first package of `alternatives` that succeeds
    pub async fn install_first_available(
        &mut self,
        host: &mut Host,
        alternatives: &[&str],
    ) -> Option<String> {
        for candidate in alternatives {
            if self.install(host, &[candidate.to_string()]).await {
                return Some(candidate.to_string());
            }
            warn!("Package {} could not be installed, trying next", candidate);
        }
        None
    }

    async fn ensure_prerequisite(&mut self, host: &mut Host) {
        let Some(repository) = self.prerequisite else {
            return;
        };
        if self.prerequisite_attempted {
            return;
        }
        self.prerequisite_attempted = true;

        let step = format!("Installing extension repository {}", repository);
        host.run_tolerant(&step, self.manager.install_command(&[repository.to_string()]))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;

    fn host(exec: ScriptedExecutor) -> Host {
        Host::new("/", false, Box::new(exec))
    }

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_install_failure_is_not_fatal() {
        let mut host = host(ScriptedExecutor::new().fail_on("DEBIAN_FRONTEND=noninteractive apt-get install"));
        let mut adapter = PackageManagerAdapter::new(PackageManager::Apt, Some(22));

        let ok = adapter.install(&mut host, &pkgs(&["curl"])).await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_install_deduplicates_and_skips_empty() {
        let mut host = host(ScriptedExecutor::new());
        let mut adapter = PackageManagerAdapter::new(PackageManager::Dnf, Some(9));

        assert!(adapter.install(&mut host, &[]).await);
        assert!(host.journal().is_empty());

        adapter.install(&mut host, &pkgs(&["git", "git", " ", "vim"])).await;
        assert_eq!(host.journal(), ["run: dnf install -y git vim"]);
    }

    #[tokio::test]
    async fn test_legacy_yum_installs_extension_repository_once() {
        let mut host = host(ScriptedExecutor::new());
        let mut adapter = PackageManagerAdapter::new(PackageManager::Yum, Some(7));

        adapter.install(&mut host, &pkgs(&["htop"])).await;
        adapter.install(&mut host, &pkgs(&["jq"])).await;

        assert_eq!(
            host.journal(),
            [
                "run: yum install -y epel-release",
                "run: yum install -y htop",
                "run: yum install -y jq",
            ]
        );
    }

    #[tokio::test]
    async fn test_upgrade_honours_flags() {
        let mut host = host(ScriptedExecutor::new());
        let mut adapter = PackageManagerAdapter::new(PackageManager::Apt, None);

        let outcome = adapter.upgrade(&mut host, false, false).await;
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert!(host.journal().is_empty());

        let outcome = adapter.upgrade(&mut host, false, true).await;
        assert_eq!(outcome, StepOutcome::Applied);
        assert_eq!(
            host.journal(),
            ["run: DEBIAN_FRONTEND=noninteractive apt-get -y autoremove"]
        );
    }

    #[tokio::test]
    async fn test_pacman_autoremove_removes_listed_orphans() {
        let mut host = host(ScriptedExecutor::new().respond("pacman -Qdtq", "libfoo\nlibbar\n"));
        let mut adapter = PackageManagerAdapter::new(PackageManager::Pacman, None);

        adapter.upgrade(&mut host, true, true).await;

        assert_eq!(
            host.journal(),
            [
                "run: pacman -Syu --noconfirm",
                "query: pacman -Qdtq",
                "run: pacman -Rns --noconfirm libfoo libbar",
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_is_tolerated() {
        let mut host = host(ScriptedExecutor::new().fail_on("zypper"));
        let mut adapter = PackageManagerAdapter::new(PackageManager::Zypper, None);

        assert!(!adapter.refresh_metadata(&mut host).await);
        let outcome = adapter.upgrade(&mut host, true, false).await;
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_metadata_is_refreshed_once_per_run() {
        let mut host = host(ScriptedExecutor::new());
        let mut adapter = PackageManagerAdapter::new(PackageManager::Apt, None);

        assert!(adapter.refresh_metadata(&mut host).await);
        assert!(adapter.ensure_metadata(&mut host).await);

        assert_eq!(
            host.journal(),
            ["run: DEBIAN_FRONTEND=noninteractive apt-get update"]
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_is_retried_on_ensure() {
        let mut host = host(ScriptedExecutor::new().fail_on("dnf -y makecache"));
        let mut adapter = PackageManagerAdapter::new(PackageManager::Dnf, None);

        adapter.refresh_metadata(&mut host).await;
        adapter.ensure_metadata(&mut host).await;

        assert_eq!(host.journal().len(), 2);
    }

    #[tokio::test]
    async fn test_install_first_available_falls_through() {
        let mut host = host(ScriptedExecutor::new().fail_on("dnf install -y docker-ce"));
        let mut adapter = PackageManagerAdapter::new(PackageManager::Dnf, Some(9));

        let installed = adapter
            .install_first_available(&mut host, &["docker-ce", "moby-engine"])
            .await;

        assert_eq!(installed.as_deref(), Some("moby-engine"));
    }
}
