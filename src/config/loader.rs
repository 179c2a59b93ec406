// file: src/config/loader.rs
// version: 2.0.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution

use super::RunConfiguration;
use crate::{BaselineError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Per-user configuration file, if a config directory is known
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("host-baseline").join("config.yaml"))
    }

    /// Load the explicit file, else the default file if present, else defaults
    pub fn load(&self, explicit: Option<&Path>) -> Result<RunConfiguration> {
        if let Some(path) = explicit {
            return self.load_run_config(path);
        }

        match Self::default_config_path() {
            Some(path) if path.exists() => self.load_run_config(&path),
            _ => Ok(RunConfiguration::default()),
        }
    }

    /// Load a run configuration from a YAML file
    pub fn load_run_config<P: AsRef<Path>>(&self, path: P) -> Result<RunConfiguration> {
        let content = fs::read_to_string(&path).map_err(|e| {
            BaselineError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        info!("Loading configuration from {}", path.as_ref().display());
        let expanded = self.expand_env_vars(&content)?;
        if expanded.trim().is_empty() {
            return Ok(RunConfiguration::default());
        }
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Expand `${VAR}` references in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| BaselineError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else if !missing_vars.iter().any(|v| v == var_name) {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(BaselineError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MirrorMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_var_expansion() {
        let mut loader = ConfigLoader::new();
        loader.set_env_var("TEST_VAR".to_string(), "test_value".to_string());

        let content = "key: ${TEST_VAR}";
        let result = loader.expand_env_vars(content).unwrap();
        assert_eq!(result, "key: test_value");
    }

    #[test]
    fn test_missing_env_var() {
        let loader = ConfigLoader::new();
        let content = "key: ${HOST_BASELINE_SURELY_MISSING_VAR}";
        assert!(loader.expand_env_vars(content).is_err());
    }

    #[test]
    fn test_load_run_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "mirror_mode: custom\ncustom_mirror_url: ${{MIRROR_HOST}}/ubuntu\ndisable_password_auth: true"
        )
        .unwrap();

        let mut loader = ConfigLoader::new();
        loader.set_env_var("MIRROR_HOST".to_string(), "http://10.0.0.5".to_string());
        let config = loader.load_run_config(file.path()).unwrap();

        assert_eq!(config.mirror_mode, MirrorMode::Custom);
        assert_eq!(config.custom_mirror(), Some("http://10.0.0.5/ubuntu"));
        assert!(config.disable_password_auth);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = ConfigLoader::new().load_run_config(file.path()).unwrap();
        assert_eq!(config, RunConfiguration::default());
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = ConfigLoader::new()
            .load(Some(Path::new("/nonexistent/host-baseline.yaml")))
            .unwrap_err();
        assert!(matches!(err, BaselineError::Config(_)));
    }
}
