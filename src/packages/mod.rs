// file: src/packages/mod.rs
// version: 1.0.0
// guid: sshpkg01-2345-6789-abcd-ef0123456789

//! Package manager backends
//!
//! Each supported package manager is a variant of [`PackageManager`] with the
//! same method set. Adding a backend means adding a variant and its arms here;
//! callers only ever see [`PackageManagerAdapter`].

pub mod adapter;

pub use adapter::PackageManagerAdapter;

use crate::executor::CommandSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Pacman,
}

impl PackageManager {
    /// Probe order; dnf hosts often ship a yum shim, so dnf wins
    pub const DETECTION_ORDER: [PackageManager; 5] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Zypper,
        PackageManager::Pacman,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Zypper => "zypper",
            PackageManager::Pacman => "pacman",
        }
    }

    /// Executable whose presence identifies this backend
    pub fn binary(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Zypper => "zypper",
            PackageManager::Pacman => "pacman",
        }
    }

    /// Whether package sources live in a deb-style source list
    pub fn uses_source_list(&self) -> bool {
        matches!(self, PackageManager::Apt)
    }

    fn base(&self) -> CommandSpec {
        let cmd = CommandSpec::new(self.binary());
        match self {
            PackageManager::Apt => cmd.env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Zypper => cmd.arg("--non-interactive"),
            _ => cmd,
        }
    }

    pub fn refresh_command(&self) -> CommandSpec {
        match self {
            PackageManager::Apt => self.base().arg("update"),
            PackageManager::Dnf | PackageManager::Yum => self.base().args(["-y", "makecache"]),
            PackageManager::Zypper => self.base().arg("refresh"),
            PackageManager::Pacman => self.base().arg("-Sy"),
        }
    }

    pub fn upgrade_command(&self) -> CommandSpec {
        match self {
            PackageManager::Apt => self.base().args(["-y", "upgrade"]),
            PackageManager::Dnf => self.base().args(["-y", "upgrade"]),
            PackageManager::Yum => self.base().args(["-y", "update"]),
            PackageManager::Zypper => self.base().arg("update"),
            PackageManager::Pacman => self.base().args(["-Syu", "--noconfirm"]),
        }
    }

    /// Single-command autoremove, where the backend has one
    pub fn autoremove_command(&self) -> Option<CommandSpec> {
        match self {
            PackageManager::Apt | PackageManager::Dnf | PackageManager::Yum => {
                Some(self.base().args(["-y", "autoremove"]))
            }
            PackageManager::Zypper | PackageManager::Pacman => None,
        }
    }

    /// Query listing orphaned packages, for backends that remove them by name
    pub fn orphan_query(&self) -> Option<CommandSpec> {
        match self {
            PackageManager::Pacman => Some(CommandSpec::new("pacman").arg("-Qdtq")),
            _ => None,
        }
    }

    pub fn remove_command(&self, packages: &[String]) -> CommandSpec {
        match self {
            PackageManager::Apt | PackageManager::Dnf | PackageManager::Yum => {
                self.base().args(["remove", "-y"]).args(packages.iter().cloned())
            }
            PackageManager::Zypper => self.base().arg("remove").args(packages.iter().cloned()),
            PackageManager::Pacman => self
                .base()
                .args(["-Rns", "--noconfirm"])
                .args(packages.iter().cloned()),
        }
    }

    pub fn install_command(&self, packages: &[String]) -> CommandSpec {
        let cmd = match self {
            PackageManager::Apt => self.base().args(["install", "-y", "--no-install-recommends"]),
            PackageManager::Dnf | PackageManager::Yum => self.base().args(["install", "-y"]),
            PackageManager::Zypper => self.base().arg("install"),
            PackageManager::Pacman => self.base().args(["-S", "--needed", "--noconfirm"]),
        };
        cmd.args(packages.iter().cloned())
    }

    /// Extension repository that must be present before other installs succeed
    pub fn prerequisite_repository(&self, major_version: Option<u32>) -> Option<&'static str> {
        match (self, major_version) {
            (PackageManager::Yum, Some(major)) if major <= 7 => Some("epel-release"),
            _ => None,
        }
    }

    pub fn ssh_server_package(&self) -> &'static str {
        match self {
            PackageManager::Pacman => "openssh",
            _ => "openssh-server",
        }
    }

    pub fn pip_package(&self) -> &'static str {
        match self {
            PackageManager::Pacman => "python-pip",
            _ => "python3-pip",
        }
    }

    /// Native container engine packages, tried in order
    pub fn container_packages(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &["docker.io", "docker-ce"],
            PackageManager::Dnf => &["docker-ce", "moby-engine"],
            PackageManager::Yum => &["docker-ce", "docker"],
            PackageManager::Zypper => &["docker"],
            PackageManager::Pacman => &["docker"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apt_install_skips_recommends() {
        let cmd = PackageManager::Apt.install_command(&pkgs(&["curl", "git"]));
        assert_eq!(
            cmd.to_string(),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends curl git"
        );
    }

    #[test]
    fn test_refresh_commands_per_backend() {
        assert_eq!(
            PackageManager::Dnf.refresh_command().to_string(),
            "dnf -y makecache"
        );
        assert_eq!(
            PackageManager::Zypper.refresh_command().to_string(),
            "zypper --non-interactive refresh"
        );
        assert_eq!(PackageManager::Pacman.refresh_command().to_string(), "pacman -Sy");
    }

    #[test]
    fn test_autoremove_support() {
        assert!(PackageManager::Apt.autoremove_command().is_some());
        assert!(PackageManager::Zypper.autoremove_command().is_none());
        assert!(PackageManager::Zypper.orphan_query().is_none());
        assert!(PackageManager::Pacman.autoremove_command().is_none());
        assert_eq!(
            PackageManager::Pacman.orphan_query().unwrap().to_string(),
            "pacman -Qdtq"
        );
    }

    #[test]
    fn test_legacy_yum_needs_extension_repository() {
        assert_eq!(
            PackageManager::Yum.prerequisite_repository(Some(7)),
            Some("epel-release")
        );
        assert_eq!(PackageManager::Yum.prerequisite_repository(Some(8)), None);
        assert_eq!(PackageManager::Yum.prerequisite_repository(None), None);
        assert_eq!(PackageManager::Dnf.prerequisite_repository(Some(7)), None);
    }

    #[test]
    fn test_package_names_by_backend() {
        assert_eq!(PackageManager::Pacman.ssh_server_package(), "openssh");
        assert_eq!(PackageManager::Apt.pip_package(), "python3-pip");
        assert_eq!(PackageManager::Apt.container_packages()[0], "docker.io");
        assert!(PackageManager::Apt.uses_source_list());
        assert!(!PackageManager::Dnf.uses_source_list());
    }
}
