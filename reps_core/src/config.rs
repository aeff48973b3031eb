//! Configuration file support for Reps.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/reps/config.toml`.

use crate::{Error, IntervalTiming, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub timer: TimerConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Interval timer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_seconds")]
    pub work_seconds: u32,

    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,

    /// Seconds added by a single "extend" intent
    #[serde(default = "default_extend_seconds")]
    pub extend_seconds: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_seconds: default_work_seconds(),
            rest_seconds: default_rest_seconds(),
            extend_seconds: default_extend_seconds(),
        }
    }
}

impl TimerConfig {
    pub fn timing(&self) -> IntervalTiming {
        IntervalTiming {
            work_seconds: self.work_seconds,
            rest_seconds: self.rest_seconds,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("reps")
}

fn default_work_seconds() -> u32 {
    60
}

fn default_rest_seconds() -> u32 {
    60
}

fn default_extend_seconds() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("reps").join("config.toml")
    }

    /// Check that every duration is usable
    pub fn validate(&self) -> Result<()> {
        let timer = &self.timer;
        for (name, value) in [
            ("work_seconds", timer.work_seconds),
            ("rest_seconds", timer.rest_seconds),
            ("extend_seconds", timer.extend_seconds),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("timer.{} must be at least 1", name)));
            }
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timer.work_seconds, 60);
        assert_eq!(config.timer.rest_seconds, 60);
        assert_eq!(config.timer.extend_seconds, 30);
        assert!(config.data.data_dir.ends_with("reps"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.timer.rest_seconds = 45;
        config.save_to(&path).unwrap();

        let parsed = Config::load_from(&path).unwrap();
        assert_eq!(parsed.timer.rest_seconds, 45);
        assert_eq!(parsed.data.data_dir, config.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[timer]
work_seconds = 40
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timer.work_seconds, 40);
        assert_eq!(config.timer.rest_seconds, 60); // default
        assert_eq!(
            config.timer.timing(),
            IntervalTiming {
                work_seconds: 40,
                rest_seconds: 60
            }
        );
    }

    #[test]
    fn test_zero_duration_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nrest_seconds = 0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
