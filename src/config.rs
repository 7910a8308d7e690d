use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_live_interval_secs")]
    pub live_interval_secs: u64,
    #[serde(default = "default_cpu_sample_window")]
    pub cpu_sample_window: String,
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            live_interval_secs: default_live_interval_secs(),
            cpu_sample_window: default_cpu_sample_window(),
            color: default_color(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.live_interval_secs < 1 {
            return Err(ConfigError::Validation(
                "live_interval_secs must be >= 1".to_string(),
            ));
        }
        self.sample_window()?;
        Ok(())
    }

    /// CPU sampling window for one-shot actions.
    pub fn sample_window(&self) -> Result<Duration, ConfigError> {
        parse_window(&self.cpu_sample_window)
    }

    pub fn live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_secs)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

pub fn parse_window(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(trimmed).map_err(|err| {
        ConfigError::Validation(format!(
            "cpu_sample_window '{raw}' is not a valid duration: {err}"
        ))
    })
}

const fn default_live_interval_secs() -> u64 {
    2
}

fn default_cpu_sample_window() -> String {
    "500ms".to_string()
}

const fn default_color() -> bool {
    true
}
