use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::GroupBy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub default_group_by: GroupBy,
    #[serde(default = "default_subtask_page_size")]
    pub subtask_page_size: usize,
    #[serde(default = "default_pending_command_ttl_secs")]
    pub pending_command_ttl_secs: u64,
    #[serde(default)]
    pub preferences_dir: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_subtask_page_size() -> usize {
    50
}

fn default_pending_command_ttl_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            team_id: None,
            default_group_by: GroupBy::Status,
            subtask_page_size: default_subtask_page_size(),
            pending_command_ttl_secs: default_pending_command_ttl_secs(),
            preferences_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("TASKSYNC_CONFIG") {
            PathBuf::from(config_path)
        } else {
            Self::base_dir().join("config.yaml")
        }
    }

    fn base_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tasksync")
    }

    /// Directory holding per-board preference files.
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_dir
            .clone()
            .unwrap_or_else(Self::base_dir)
            .join("boards")
    }

    pub fn with_team_id(mut self, team_id: Option<String>) -> Self {
        if team_id.is_some() {
            self.team_id = team_id;
        }
        self
    }
}
