// file: src/host/probe.rs
// version: 1.0.0
// guid: probe001-2345-6789-abcd-ef0123456789

//! Host identity detection

use super::Host;
use crate::executor::CommandSpec;
use crate::packages::PackageManager;
use crate::{BaselineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

pub const OS_RELEASE: &str = "/etc/os-release";

/// Identity of the host, computed once at the start of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProfile {
    pub distro_id: String,
    pub id_like: Vec<String>,
    pub version: String,
    pub codename: Option<String>,
    pub package_manager: PackageManager,
    pub ssh_service: String,
}

/// Distribution family, as far as mirror layout is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    Ubuntu,
    Debian,
    Other,
}

impl HostProfile {
    pub fn family(&self) -> DistroFamily {
        let is = |name: &str| self.distro_id == name || self.id_like.iter().any(|l| l == name);
        if is("ubuntu") {
            DistroFamily::Ubuntu
        } else if is("debian") {
            DistroFamily::Debian
        } else {
            DistroFamily::Other
        }
    }

    /// Leading numeric component of the version, e.g. 7 for "7.9"
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.parse().ok()
    }
}

/// Read-only detection of distribution, package manager and SSH unit
pub struct HostProbe<'a> {
    host: &'a mut Host,
}

impl<'a> HostProbe<'a> {
    pub fn new(host: &'a mut Host) -> Self {
        Self { host }
    }

    pub async fn probe(&mut self) -> Result<HostProfile> {
        info!("Detecting host identity");

        let os_release = self
            .host
            .read_file(OS_RELEASE)
            .await
            .ok_or_else(|| BaselineError::MissingIdentity(self.host.path(OS_RELEASE)))?;
        let fields = parse_os_release(&os_release);

        let package_manager = self.detect_package_manager()?;
        let ssh_service = self.detect_ssh_service().await;

        let profile = HostProfile {
            distro_id: fields.get("ID").cloned().unwrap_or_else(|| "linux".to_string()),
            id_like: fields
                .get("ID_LIKE")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            version: fields.get("VERSION_ID").cloned().unwrap_or_default(),
            codename: fields
                .get("VERSION_CODENAME")
                .or_else(|| fields.get("UBUNTU_CODENAME"))
                .filter(|c| !c.is_empty())
                .cloned(),
            package_manager,
            ssh_service,
        };

        info!(
            "Host: {} {} ({}), package manager {}, ssh unit {}",
            profile.distro_id,
            profile.version,
            profile.codename.as_deref().unwrap_or("no codename"),
            profile.package_manager.as_str(),
            profile.ssh_service
        );
        Ok(profile)
    }

    fn detect_package_manager(&self) -> Result<PackageManager> {
        PackageManager::DETECTION_ORDER
            .into_iter()
            .find(|pm| self.host.has_program(pm.binary()))
            .ok_or_else(|| {
                BaselineError::unsupported_host(
                    "no supported package manager found (apt, dnf, yum, zypper, pacman)",
                )
            })
    }

    async fn detect_ssh_service(&mut self) -> String {
        let query = CommandSpec::new("systemctl").args([
            "list-unit-files",
            "--type=service",
            "--no-legend",
            "--no-pager",
        ]);
        match self.host.query(query).await {
            Ok(output) if output.success() => ssh_unit_from_listing(&output.stdout),
            _ => {
                debug!("Unit listing unavailable, assuming sshd");
                "sshd".to_string()
            }
        }
    }
}

/// Parse KEY=VALUE lines, stripping optional quotes
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Pick `ssh` or `sshd` from a unit-file listing, defaulting to `sshd`
pub fn ssh_unit_from_listing(listing: &str) -> String {
    let units: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    if units.contains(&"ssh.service") {
        "ssh".to_string()
    } else {
        "sshd".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ScriptedExecutor;
    use tempfile::TempDir;

    const UBUNTU: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=jammy
"#;

    fn root_with_os_release(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/os-release"), content).unwrap();
        dir
    }

    #[test]
    fn test_parse_os_release_strips_quotes() {
        let fields = parse_os_release(UBUNTU);
        assert_eq!(fields["ID"], "ubuntu");
        assert_eq!(fields["VERSION_ID"], "22.04");
        assert_eq!(fields["PRETTY_NAME"], "Ubuntu 22.04.4 LTS");
    }

    #[test]
    fn test_ssh_unit_from_listing() {
        assert_eq!(ssh_unit_from_listing("ssh.service enabled enabled\n"), "ssh");
        assert_eq!(ssh_unit_from_listing("sshd.service enabled disabled\n"), "sshd");
        assert_eq!(ssh_unit_from_listing("cron.service enabled enabled\n"), "sshd");
        assert_eq!(ssh_unit_from_listing(""), "sshd");
    }

    #[tokio::test]
    async fn test_probe_ubuntu_host() {
        let root = root_with_os_release(UBUNTU);
        let exec = ScriptedExecutor::new()
            .with_programs(["apt-get", "yum"])
            .respond("systemctl list-unit-files", "ssh.service enabled enabled\n");
        let mut host = Host::new(root.path(), false, Box::new(exec));

        let profile = HostProbe::new(&mut host).probe().await.unwrap();

        assert_eq!(profile.distro_id, "ubuntu");
        assert_eq!(profile.codename.as_deref(), Some("jammy"));
        assert_eq!(profile.package_manager, PackageManager::Apt);
        assert_eq!(profile.ssh_service, "ssh");
        assert_eq!(profile.family(), DistroFamily::Ubuntu);
    }

    #[tokio::test]
    async fn test_probe_legacy_centos() {
        let root = root_with_os_release("ID=\"centos\"\nID_LIKE=\"rhel fedora\"\nVERSION_ID=\"7\"\n");
        let exec = ScriptedExecutor::new()
            .with_programs(["yum"])
            .fail_on("systemctl");
        let mut host = Host::new(root.path(), false, Box::new(exec));

        let profile = HostProbe::new(&mut host).probe().await.unwrap();

        assert_eq!(profile.package_manager, PackageManager::Yum);
        assert_eq!(profile.major_version(), Some(7));
        assert_eq!(profile.ssh_service, "sshd");
        assert_eq!(profile.codename, None);
        assert_eq!(profile.family(), DistroFamily::Other);
    }

    #[tokio::test]
    async fn test_probe_without_package_manager_is_fatal() {
        let root = root_with_os_release(UBUNTU);
        let mut host = Host::new(root.path(), false, Box::new(ScriptedExecutor::new()));

        let err = HostProbe::new(&mut host).probe().await.unwrap_err();
        assert!(matches!(err, BaselineError::UnsupportedHost(_)));
    }

    #[tokio::test]
    async fn test_probe_without_identity_file_is_fatal() {
        let root = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new().with_programs(["apt-get"]);
        let mut host = Host::new(root.path(), false, Box::new(exec));

        let err = HostProbe::new(&mut host).probe().await.unwrap_err();
        assert!(matches!(err, BaselineError::MissingIdentity(_)));
    }
}
