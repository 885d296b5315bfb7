//! Configuration for the swfme command-line tool.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SWFME_LOG, SWFME_EVENT_HISTORY)
//! 2. Config file (.swfme/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .swfme/config.yaml
//! - Falls back to ~/.swfme/config.yaml
//!
//! The engine itself never reads this; the CLI resolves it and hands the
//! values to the event bus and the logger.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::logging::DEFAULT_MAX_VALUE_LENGTH;
use crate::monitoring::event_bus::DEFAULT_MAX_HISTORY;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".swfme";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "swfme=debug"
    pub level: Option<String>,
    /// Truncation length for logged parameter values
    pub max_value_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBusConfig {
    pub max_history: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    pub enabled: Option<bool>,
}

/// Resolved configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub log_level: String,
    pub max_value_length: usize,
    pub event_history: usize,
    pub metrics_enabled: bool,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            event_history: DEFAULT_MAX_HISTORY,
            metrics_enabled: true,
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    fn from_file(config: ConfigFile, config_file: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            log_level: config.logging.level.unwrap_or(defaults.log_level),
            max_value_length: config
                .logging
                .max_value_length
                .unwrap_or(defaults.max_value_length),
            event_history: config
                .event_bus
                .max_history
                .unwrap_or(defaults.event_history),
            metrics_enabled: config.metrics.enabled.unwrap_or(defaults.metrics_enabled),
            config_file,
        }
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("SWFME_LOG") {
            self.log_level = level;
        }
        if let Some(history) = lookup("SWFME_EVENT_HISTORY") {
            self.event_history = history
                .trim()
                .parse()
                .with_context(|| format!("Invalid SWFME_EVENT_HISTORY: {}", history))?;
        }
        Ok(())
    }
}

/// Find config file by searching `start` and its parents, then the home directory
fn find_config_file(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    home.map(|h| h.join(CONFIG_DIR).join(CONFIG_FILE))
        .filter(|p| p.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn resolve(start: &Path, home: Option<&Path>) -> Result<ResolvedConfig> {
    match find_config_file(start, home) {
        Some(path) => {
            let file = load_config_file(&path)?;
            Ok(ResolvedConfig::from_file(file, Some(path)))
        }
        None => Ok(ResolvedConfig::default()),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let home = dirs::home_dir();

    let mut config = resolve(&cwd, home.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", content).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = resolve(temp.path(), None).unwrap();

        assert_eq!(config, ResolvedConfig::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_value_length, 100);
        assert_eq!(config.event_history, 10_000);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
logging:
  level: debug
  max_value_length: 40
event_bus:
  max_history: 500
metrics:
  enabled: false
"#,
        );

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version.as_deref(), Some("1.0"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.event_bus.max_history, Some(500));
        assert_eq!(config.metrics.enabled, Some(false));
    }

    #[test]
    fn test_discovery_walks_up_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(temp.path(), "logging:\n  level: warn");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = resolve(&nested, None).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.event_history, 10_000);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_home_fallback() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        write_config(home.path(), "event_bus:\n  max_history: 42");

        let config = resolve(project.path(), Some(home.path())).unwrap();
        assert_eq!(config.event_history, 42);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("SWFME_LOG", "trace"), ("SWFME_EVENT_HISTORY", "7")]
            .into_iter()
            .collect();

        let mut config = ResolvedConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.event_history, 7);

        let mut config = ResolvedConfig::default();
        let err = config
            .apply_env(|key| (key == "SWFME_EVENT_HISTORY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("SWFME_EVENT_HISTORY"));
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "logging: [unclosed");
        assert!(resolve(temp.path(), None).is_err());
    }
}
