// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Run configuration
//!
//! A [`RunConfiguration`] is resolved once (file, then command line, then
//! interactive intent) and passed by reference to every component. Nothing
//! mutates it afterwards; the SSH guard reports its downgrade as a separate
//! decision instead.

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How package sources are configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorMode {
    /// Leave the distribution's sources untouched
    #[default]
    Default,
    /// Use the fixed regional mirror for the distro family
    Regional,
    /// Use the operator supplied mirror URL
    Custom,
}

/// How the pip package index is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipMirrorMode {
    /// Follow the package mirror mode: regional when it is regional
    #[default]
    Auto,
    None,
    Regional,
    Custom,
}

impl MirrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorMode::Default => "default",
            MirrorMode::Regional => "regional",
            MirrorMode::Custom => "custom",
        }
    }
}

impl PipMirrorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipMirrorMode::Auto => "auto",
            PipMirrorMode::None => "none",
            PipMirrorMode::Regional => "regional",
            PipMirrorMode::Custom => "custom",
        }
    }
}

/// Known-good regional endpoints. Configuration data, not logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorTable {
    pub ubuntu: String,
    pub debian: String,
    pub pip_index: String,
    pub registry: String,
}

impl Default for MirrorTable {
    fn default() -> Self {
        Self {
            ubuntu: "http://mirrors.aliyun.com/ubuntu".to_string(),
            debian: "http://mirrors.aliyun.com/debian".to_string(),
            pip_index: "https://pypi.tuna.tsinghua.edu.cn/simple".to_string(),
            registry: "https://docker.m.daocloud.io".to_string(),
        }
    }
}

/// Everything one run needs to know about operator intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    pub mirror_mode: MirrorMode,
    pub custom_mirror_url: Option<String>,
    /// Validated to 1-65535
    pub ssh_port: u32,
    pub disable_password_auth: bool,
    pub force_unsafe_ssh: bool,
    pub locale: String,
    pub timezone: Option<String>,
    pub install_container_runtime: bool,
    pub registry_mirrors: Vec<String>,
    pub pip_mirror: PipMirrorMode,
    pub pip_mirror_url: Option<String>,
    pub upgrade_packages: bool,
    pub autoremove: bool,
    pub base_packages: Vec<String>,
    pub mirrors: MirrorTable,
    pub unattended: bool,
    pub dry_run: bool,
    pub log_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            mirror_mode: MirrorMode::Default,
            custom_mirror_url: None,
            ssh_port: 22,
            disable_password_auth: false,
            force_unsafe_ssh: false,
            locale: "en_US.UTF-8".to_string(),
            timezone: None,
            install_container_runtime: true,
            registry_mirrors: Vec::new(),
            pip_mirror: PipMirrorMode::Auto,
            pip_mirror_url: None,
            upgrade_packages: true,
            autoremove: true,
            base_packages: [
                "curl",
                "wget",
                "git",
                "vim",
                "htop",
                "unzip",
                "ca-certificates",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            mirrors: MirrorTable::default(),
            unattended: false,
            dry_run: false,
            log_path: PathBuf::from("/var/log/host-baseline.log"),
            backup_dir: PathBuf::from("/var/backups/host-baseline"),
        }
    }
}

impl RunConfiguration {
    /// SSH port as a socket port. Only meaningful after validation.
    pub fn port(&self) -> u16 {
        u16::try_from(self.ssh_port).unwrap_or(22)
    }

    /// Custom mirror URL, if one was given and is not blank
    pub fn custom_mirror(&self) -> Option<&str> {
        non_blank(self.custom_mirror_url.as_deref())
    }

    pub fn custom_pip_mirror(&self) -> Option<&str> {
        non_blank(self.pip_mirror_url.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
