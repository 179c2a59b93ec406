// file: src/pip.rs
// version: 1.0.0
// guid: pipmir01-2345-6789-abcd-ef0123456789

//! pip package index mirror

use crate::config::{MirrorMode, PipMirrorMode, RunConfiguration};
use crate::host::Host;
use crate::mutation::SafeFileMutator;
use crate::packages::PackageManagerAdapter;
use crate::steps::StepOutcome;
use crate::Result;
use tracing::{info, warn};

pub const PIP_CONF: &str = "/etc/pip.conf";

/// Seconds pip waits on the index before giving up
pub const PIP_TIMEOUT_SECS: u32 = 120;

pub struct PipMirrorConfigurator<'a> {
    host: &'a mut Host,
    mutator: &'a mut SafeFileMutator,
    packages: &'a mut PackageManagerAdapter,
}

impl<'a> PipMirrorConfigurator<'a> {
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

    pub async fn apply(&mut self, config: &RunConfiguration) -> Result<StepOutcome> {
        let Some(index_url) = resolve_index_url(config) else {
            info!("No pip mirror requested (mode {})", config.pip_mirror.as_str());
            return Ok(StepOutcome::skipped("no pip mirror"));
        };

        let pip = self.packages.manager().pip_package();
        let mut outcome = StepOutcome::Unchanged;
        if !self.packages.install(self.host, &[pip.to_string()]).await {
            outcome = StepOutcome::degraded(format!("{} could not be installed", pip));
        }

        let content = render_pip_conf(&index_url);
        let handle = self
            .mutator
            .mutate(self.host, PIP_CONF, &format!("pip index {}", index_url), |_| Ok(content))
            .await?;

        if handle.changed {
            outcome = outcome.merge(StepOutcome::Applied);
        }
        Ok(outcome)
    }
}

/// Index URL for the configured pip mode, if any
pub fn resolve_index_url(config: &RunConfiguration) -> Option<String> {
    match config.pip_mirror {
        PipMirrorMode::None => None,
        PipMirrorMode::Auto if config.mirror_mode == MirrorMode::Regional => {
            Some(config.mirrors.pip_index.clone())
        }
        PipMirrorMode::Auto => None,
        PipMirrorMode::Regional => Some(config.mirrors.pip_index.clone()),
        PipMirrorMode::Custom => match config.custom_pip_mirror() {
            Some(url) => Some(url.to_string()),
            None => {
                warn!("Custom pip mirror mode without an index URL; pip config NOT changed");
                None
            }
        },
    }
}

/// `[global]` section with the index, a fixed timeout, and trusted-host for plain http
pub fn render_pip_conf(index_url: &str) -> String {
    let mut content = String::from("[global]\n");
    content.push_str(&format!("index-url = {}\n", index_url));
    content.push_str(&format!("timeout = {}\n", PIP_TIMEOUT_SECS));

    if let Some(rest) = index_url.strip_prefix("http://") {
        let host = rest.split(['/', ':']).next().unwrap_or(rest);
        if !host.is_empty() {
            content.push_str(&format!("trusted-host = {}\n", host));
        }
    }
    content
}
