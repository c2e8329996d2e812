/// Application configuration management
/// Stored in ~/.config/galera-dash/config.toml, overridable from the environment and CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{
    MetricDef, Thresholds, DEFAULT_BACKEND_NAME, DEFAULT_BASE_URL, DEFAULT_POLL_SECS,
    DEFAULT_REQUEST_TIMEOUT, MAX_POINTS,
};

const APP_DIR: &str = "galera-dash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dashboard backend, e.g. http://monitor:5000
    pub base_url: String,
    pub poll_interval_secs: u32,
    pub max_points: usize,
    /// humantime duration, e.g. "5s"
    pub request_timeout: String,
    pub log_level: String,
    pub log_file: Option<String>,
    /// HAProxy backend the cluster nodes live in
    pub backend_name: String,
    /// Per-metric overrides of the catalogue thresholds
    pub thresholds: BTreeMap<String, Thresholds>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_SECS,
            max_points: MAX_POINTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT.to_string(),
            log_level: "info".to_string(),
            log_file: None,
            backend_name: DEFAULT_BACKEND_NAME.to_string(),
            thresholds: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Directory holding the config file and the default log
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Failed to get config directory")?;
        Ok(base.join(APP_DIR))
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from the default location; a missing file means defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply GALERA_DASH_* environment overrides (after .env has been loaded)
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GALERA_DASH_URL").filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup("GALERA_DASH_INTERVAL").and_then(|s| s.trim().parse().ok()) {
            self.poll_interval_secs = secs;
        }
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.request_timeout)
            .with_context(|| format!("Invalid request_timeout '{}'", self.request_timeout))
    }

    /// Thresholds for a catalogue metric, config overrides first
    pub fn thresholds_for(&self, def: &MetricDef) -> Thresholds {
        self.thresholds
            .get(def.key)
            .copied()
            .unwrap_or(def.thresholds)
    }

    /// Log file for the interactive dashboard
    pub fn log_file_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::config_dir()?.join("galera-dash.log")),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            errors.push(format!("base_url must be an http(s) URL: {}", self.base_url));
        }

        if self.poll_interval_secs == 0 {
            errors.push("poll_interval_secs must be at least 1".to_string());
        }

        if self.max_points == 0 {
            errors.push("max_points must be at least 1".to_string());
        }

        if humantime::parse_duration(&self.request_timeout).is_err() {
            errors.push(format!("Invalid request_timeout: {}", self.request_timeout));
        }

        for (key, t) in &self.thresholds {
            if let (Some(warning), Some(danger)) = (t.warning, t.danger) {
                if warning >= danger {
                    errors.push(format!(
                        "thresholds.{}: warning ({}) must be below danger ({})",
                        key, warning, danger
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::find_metric;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.max_points, 1000);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_and_threshold_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://monitor:5000\"").unwrap();
        writeln!(file, "poll_interval_secs = 10").unwrap();
        writeln!(file, "[thresholds.wsrep_local_recv_queue]").unwrap();
        writeln!(file, "warning = 5.0").unwrap();
        writeln!(file, "danger = 50.0").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.base_url, "http://monitor:5000");
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.max_points, 1000);

        let recv = find_metric("wsrep_local_recv_queue").unwrap();
        let t = config.thresholds_for(recv);
        assert_eq!(t.warning, Some(5.0));
        assert_eq!(t.danger, Some(50.0));

        let send = find_metric("wsrep_local_send_queue").unwrap();
        assert_eq!(config.thresholds_for(send).warning, Some(10.0));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.backend_name = "db_backend".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.backend_name, "db_backend");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_from(|key| match key {
            "GALERA_DASH_URL" => Some("https://dash.internal".to_string()),
            "GALERA_DASH_INTERVAL" => Some("15".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://dash.internal");
        assert_eq!(config.poll_interval_secs, 15);

        // Garbage interval is ignored
        config.apply_env_from(|key| (key == "GALERA_DASH_INTERVAL").then(|| "soon".to_string()));
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = AppConfig::default();
        config.base_url = "monitor:5000".to_string();
        config.poll_interval_secs = 0;
        config.request_timeout = "fast".to_string();
        config.thresholds.insert(
            "wsrep_local_send_queue".to_string(),
            Thresholds {
                warning: Some(20.0),
                danger: Some(10.0),
            },
        );

        let errors = config.validate();
        assert_eq!(errors.len(), 4);
        assert!(config.request_timeout().is_err());
    }
}
