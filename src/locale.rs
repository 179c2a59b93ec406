// file: src/locale.rs
// version: 1.0.0
// guid: locale01-2345-6789-abcd-ef0123456789

//! System locale and timezone

use crate::executor::CommandSpec;
use crate::host::Host;
use crate::mutation::SafeFileMutator;
use crate::packages::{PackageManager, PackageManagerAdapter};
use crate::steps::StepOutcome;
use crate::Result;
use tracing::{info, warn};

pub const LOCALE_GEN: &str = "/etc/locale.gen";
pub const ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

pub struct LocaleConfigurator<'a> {
    host: &'a mut Host,
    mutator: &'a mut SafeFileMutator,
    packages: &'a mut PackageManagerAdapter,
}

impl<'a> LocaleConfigurator<'a> {
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

    pub async fn set_timezone(&mut self, timezone: Option<&str>) -> StepOutcome {
        let Some(tz) = timezone.map(str::trim).filter(|tz| !tz.is_empty()) else {
            return StepOutcome::skipped("no timezone requested");
        };

        let zone_file = format!("{}/{}", ZONEINFO_DIR, tz);
        if !self.host.exists(&zone_file) {
            warn!("Unknown timezone {} ({} not found); timezone NOT changed", tz, zone_file);
            return StepOutcome::degraded(format!("unknown timezone {}", tz));
        }

        if self
            .host
            .run_tolerant(
                "Setting timezone",
                CommandSpec::new("timedatectl").args(["set-timezone", tz]),
            )
            .await
        {
            StepOutcome::Applied
        } else {
            StepOutcome::degraded("timedatectl failed")
        }
    }

    pub async fn set_locale(&mut self, locale: &str) -> Result<StepOutcome> {
        let lang = format!("LANG={}", locale);

        if self.packages.manager() != PackageManager::Apt {
            let ok = self
                .host
                .run_tolerant(
                    "Setting system locale",
                    CommandSpec::new("localectl").args(["set-locale", lang.as_str()]),
                )
                .await;
            return Ok(if ok {
                StepOutcome::Applied
            } else {
                StepOutcome::degraded("localectl failed")
            });
        }

        let mut outcome = StepOutcome::Unchanged;
        if !self.packages.install(self.host, &["locales".to_string()]).await {
            outcome = StepOutcome::degraded("locales package could not be installed");
        }

        let handle = self
            .mutator
            .mutate(self.host, LOCALE_GEN, &format!("enable {}", locale), |existing| {
                Ok(enable_locale_line(existing.unwrap_or_default(), locale))
            })
            .await?;
        if handle.changed {
            outcome = outcome.merge(StepOutcome::Applied);
        }

        let generated = self
            .host
            .run_tolerant("Generating locales", CommandSpec::new("locale-gen"))
            .await;
        let updated = self
            .host
            .run_tolerant(
                "Setting default locale",
                CommandSpec::new("update-locale").arg(lang.as_str()),
            )
            .await;
        if !(generated && updated) {
            outcome = outcome.merge(StepOutcome::degraded("locale generation failed"));
        } else {
            info!("System locale set to {}", locale);
        }
        Ok(outcome)
    }
}

/// Charset part of a locale name, `UTF-8` for `en_US.UTF-8`
fn charset_of(locale: &str) -> &str {
    locale
        .split_once('.')
        .map(|(_, rest)| rest.split('@').next().unwrap_or(rest))
        .unwrap_or("UTF-8")
}

/// Uncomment the locale's line in locale.gen, or append it
pub fn enable_locale_line(existing: &str, locale: &str) -> String {
    let wanted = format!("{} {}", locale, charset_of(locale));
    let mut found = false;

    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            let candidate = line.trim_start_matches('#').trim();
            if !found && candidate.split_whitespace().next() == Some(locale) {
                found = true;
                candidate.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(wanted);
    }
    lines.join("\n") + "\n"
}
