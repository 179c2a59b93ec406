// file: src/mirror.rs
// version: 1.0.0
// guid: mirror01-2345-6789-abcd-ef0123456789

//! Package source configuration for deb-style source lists

use crate::config::{MirrorMode, RunConfiguration};
use crate::host::probe::DistroFamily;
use crate::host::{Host, HostProfile};
use crate::mutation::SafeFileMutator;
use crate::packages::PackageManagerAdapter;
use crate::steps::StepOutcome;
use crate::Result;
use tracing::{info, warn};

pub const SOURCES_LIST: &str = "/etc/apt/sources.list";

/// Rewrites the package source list for default, regional or custom mirrors
pub struct MirrorConfigurator<'a> {
    host: &'a mut Host,
    mutator: &'a mut SafeFileMutator,
    packages: &'a mut PackageManagerAdapter,
}

impl<'a> MirrorConfigurator<'a> {
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

    pub async fn apply(&mut self, profile: &HostProfile, config: &RunConfiguration) -> Result<StepOutcome> {
        if config.mirror_mode == MirrorMode::Default {
            info!("Mirror mode is default; package sources left untouched");
            return Ok(StepOutcome::skipped("default mirror mode"));
        }

        if !profile.package_manager.uses_source_list() {
            warn!(
                "Mirror mode {} requested but {} does not use a source list; package sources NOT changed",
                config.mirror_mode.as_str(),
                profile.package_manager.as_str()
            );
            return Ok(StepOutcome::skipped(format!(
                "{} sources are not managed",
                profile.package_manager.as_str()
            )));
        }

        let Some(codename) = profile.codename.as_deref() else {
            warn!("Host reports no release codename; package sources NOT changed");
            return Ok(StepOutcome::skipped("no release codename"));
        };

        let family = profile.family();
        let mirror = match config.mirror_mode {
            MirrorMode::Regional => match family {
                DistroFamily::Ubuntu => config.mirrors.ubuntu.as_str(),
                DistroFamily::Debian => config.mirrors.debian.as_str(),
                DistroFamily::Other => {
                    warn!(
                        "No regional mirror known for {}; package sources NOT changed",
                        profile.distro_id
                    );
                    return Ok(StepOutcome::skipped("no regional mirror for distro"));
                }
            },
            MirrorMode::Custom => match config.custom_mirror() {
                Some(url) => url,
                None => {
                    warn!("Custom mirror mode without a mirror URL; package sources NOT changed");
                    return Ok(StepOutcome::skipped("custom mirror URL missing"));
                }
            },
            MirrorMode::Default => return Ok(StepOutcome::skipped("default mirror mode")),
        };

        let content = render_sources_list(family, mirror, codename);
        let description = format!("{} mirror {}", config.mirror_mode.as_str(), mirror);
        let handle = self
            .mutator
            .mutate(self.host, SOURCES_LIST, &description, |_| Ok(content))
            .await?;

        self.packages.refresh_metadata(self.host).await;

        Ok(if handle.changed {
            StepOutcome::Applied
        } else {
            StepOutcome::Unchanged
        })
    }
}

/// Full source list: one `deb` line per suite
pub fn render_sources_list(family: DistroFamily, mirror: &str, codename: &str) -> String {
    let mirror = mirror.trim_end_matches('/');
    let components = match family {
        DistroFamily::Debian => "main contrib non-free non-free-firmware",
        _ => "main restricted universe multiverse",
    };

    let mut lines = vec![
        "# Managed by host-baseline-agent; the previous file is in the run's backup directory"
            .to_string(),
    ];
    for suite in ["", "-updates", "-backports"] {
        lines.push(format!("deb {} {}{} {}", mirror, codename, suite, components));
    }

    // Debian serves security updates from a separate archive
    let security = match family {
        DistroFamily::Debian => format!(
            "deb {}-security {}-security {}",
            mirror, codename, components
        ),
        _ => format!("deb {} {}-security {}", mirror, codename, components),
    };
    lines.push(security);

    lines.join("\n") + "\n"
}
