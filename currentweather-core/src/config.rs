use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{
    location::Priority,
    model::Units,
    pipeline::OrderingPolicy,
    presentation::default_units_for_region,
    provider::openweather::DEFAULT_BASE_URL,
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

fn default_timeout_secs() -> u64 {
    10
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "metric"
/// region = "GB"
/// ordering = "latest_request_wins"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,

    /// Explicit unit system; derived from `region` when absent.
    pub units: Option<Units>,

    /// Two-letter region code, e.g. "US".
    pub region: Option<String>,

    /// Override for the API base URL, e.g. a local mock.
    pub base_url: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub ordering: OrderingPolicy,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            units: None,
            region: None,
            base_url: None,
            priority: Priority::default(),
            ordering: OrderingPolicy::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    /// The API key from the environment, if set, replaces the stored one.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&Self::config_file_path()?)?;
        let env_key = std::env::var(API_KEY_ENV).ok().map(|k| k.trim().to_string());
        if let Some(key) = env_key.filter(|k| !k.is_empty()) {
            cfg.api_key = Some(key);
        }
        Ok(cfg)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "currentweather", "currentweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the file backing the weather cache.
    pub fn cache_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("cache.json"))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `currentweather configure` or set {API_KEY_ENV}."
            )
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Configured units, or the region's customary ones.
    pub fn effective_units(&self) -> Units {
        self.units.unwrap_or_else(|| default_units_for_region(self.region.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn require_api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.require_api_key().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `currentweather configure`"));
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let cfg = Config { api_key: Some(String::new()), ..Config::default() };
        assert!(cfg.require_api_key().is_err());
    }

    #[test]
    fn units_fall_back_to_region() {
        let mut cfg = Config::default();
        assert_eq!(cfg.effective_units(), Units::Metric);

        cfg.region = Some("US".into());
        assert_eq!(cfg.effective_units(), Units::Imperial);

        cfg.units = Some(Units::Standard);
        assert_eq!(cfg.effective_units(), Units::Standard);
    }

    #[test]
    fn base_url_defaults_to_openweather() {
        let mut cfg = Config::default();
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);

        cfg.base_url = Some("http://127.0.0.1:9000".into());
        assert_eq!(cfg.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let cfg = Config::load_from(&tmp.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("config.toml");

        let cfg = Config {
            api_key: Some("KEY".into()),
            units: Some(Units::Imperial),
            region: Some("US".into()),
            ordering: OrderingPolicy::LatestRequestWins,
            ..Config::default()
        };
        cfg.save_to(&path).expect("save");

        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("units = \"imperial\""));
        assert!(text.contains("ordering = \"latest_request_wins\""));

        assert_eq!(Config::load_from(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_gets_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "api_key = \"abc\"\n").expect("write");

        let cfg = Config::load_from(&path).expect("load");
        assert_eq!(cfg.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.timeout_secs, 10);
        assert_eq!(cfg.priority, Priority::BalancedPowerAccuracy);
    }
}
