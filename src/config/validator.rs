// file: src/config/validator.rs
// version: 2.0.0
// guid: e5f6g7h8-i9j0-1234-5678-90abcdef1234

//! Run configuration validation
//!
//! Hard errors reject the configuration before anything runs. Soft findings
//! come back as warnings: the affected step will be a visible no-op.

use super::{MirrorMode, PipMirrorMode, RunConfiguration};
use crate::{BaselineError, Result};
use regex::Regex;
use tracing::{info, warn};

/// Validate the configuration, returning warnings for degraded-but-runnable settings
pub fn validate_config(config: &RunConfiguration) -> Result<Vec<String>> {
    info!("Validating run configuration");
    let mut warnings = Vec::new();

    validate_port(config.ssh_port)?;
    validate_locale(&config.locale)?;

    if let Some(tz) = &config.timezone {
        validate_timezone(tz)?;
    }

    match (config.mirror_mode, config.custom_mirror()) {
        (MirrorMode::Custom, None) => {
            warnings.push("custom mirror mode without a mirror URL; sources stay untouched".to_string())
        }
        (_, Some(url)) => validate_url(url)?,
        _ => {}
    }

    match (config.pip_mirror, config.custom_pip_mirror()) {
        (PipMirrorMode::Custom, None) => warnings
            .push("custom pip mirror mode without an index URL; pip config stays untouched".to_string()),
        (_, Some(url)) => validate_url(url)?,
        _ => {}
    }

    for mirror in &config.registry_mirrors {
        validate_url(mirror)?;
    }

    if config.force_unsafe_ssh && !config.disable_password_auth {
        warnings.push(
            "force_unsafe_ssh has no effect unless password authentication is being disabled".to_string(),
        );
    }

    for warning in &warnings {
        warn!("{}", warning);
    }

    Ok(warnings)
}

/// SSH port must be an integer in 1-65535
pub fn validate_port(port: u32) -> Result<()> {
    if port == 0 || port > 65535 {
        return Err(BaselineError::validation(format!(
            "SSH port {} is outside 1-65535",
            port
        )));
    }
    Ok(())
}

fn validate_locale(locale: &str) -> Result<()> {
    let re = Regex::new(r"^([A-Za-z]{2,3}(_[A-Za-z]{2})?(\.[A-Za-z0-9-]+)?(@[A-Za-z]+)?|C(\.UTF-8)?|POSIX)$")
        .map_err(|e| BaselineError::config(format!("Invalid regex pattern: {}", e)))?;

    if !re.is_match(locale) {
        return Err(BaselineError::validation(format!("Invalid locale: {}", locale)));
    }
    Ok(())
}

fn validate_timezone(tz: &str) -> Result<()> {
    let valid = !tz.is_empty()
        && !tz.starts_with('/')
        && !tz.split('/').any(|part| part.is_empty() || part == "..")
        && tz
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/_-+".contains(c));

    if !valid {
        return Err(BaselineError::validation(format!("Invalid timezone: {}", tz)));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| BaselineError::validation(format!("Mirror URL must be http(s): {}", url)))?;

    if rest.is_empty() || rest.starts_with('/') || rest.chars().any(char::is_whitespace) {
        return Err(BaselineError::validation(format!("Invalid mirror URL: {}", url)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let warnings = validate_config(&RunConfiguration::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_port_range() {
        assert!(validate_port(1).is_ok());
        assert!(validate_port(65535).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(65536).is_err());
    }

    #[test]
    fn test_custom_mirror_without_url_warns() {
        let config = RunConfiguration {
            mirror_mode: MirrorMode::Custom,
            ..Default::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_bad_urls_are_rejected() {
        let config = RunConfiguration {
            mirror_mode: MirrorMode::Custom,
            custom_mirror_url: Some("ftp://mirror".to_string()),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = RunConfiguration {
            registry_mirrors: vec!["https://ok.example".to_string(), "https:// bad".to_string()],
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_locale_and_timezone_formats() {
        assert!(validate_locale("en_US.UTF-8").is_ok());
        assert!(validate_locale("zh_CN.UTF-8").is_ok());
        assert!(validate_locale("C.UTF-8").is_ok());
        assert!(validate_locale("en US").is_err());

        assert!(validate_timezone("Asia/Shanghai").is_ok());
        assert!(validate_timezone("Etc/GMT+8").is_ok());
        assert!(validate_timezone("../etc/passwd").is_err());
        assert!(validate_timezone("/etc/localtime").is_err());
    }

    #[test]
    fn test_force_without_disable_warns() {
        let config = RunConfiguration {
            force_unsafe_ssh: true,
            ..Default::default()
        };
        assert_eq!(validate_config(&config).unwrap().len(), 1);
    }
}
