use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::GroupBy;
use crate::utils::compute_board_hash;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BoardPreferences {
    board_id: String,
    #[serde(default)]
    group_by: GroupBy,
}

/// Per-board view preferences, one YAML file per board.
#[derive(Debug, Clone)]
pub struct Preferences {
    dir: PathBuf,
}

impl Preferences {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, board_id: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", compute_board_hash(board_id)))
    }

    /// Stored grouping of `board_id`, if any. Unreadable files count as unset.
    pub fn group_by(&self, board_id: &str) -> Option<GroupBy> {
        let path = self.file_for(board_id);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_yaml::from_str::<BoardPreferences>(&content) {
            Ok(prefs) if prefs.board_id == board_id => Some(prefs.group_by),
            Ok(prefs) => {
                warn!(
                    "Preference file {:?} belongs to board {}, ignoring",
                    path, prefs.board_id
                );
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable preference file {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn set_group_by(&self, board_id: &str, group_by: GroupBy) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create preferences dir: {:?}", self.dir))?;

        let prefs = BoardPreferences {
            board_id: board_id.to_string(),
            group_by,
        };
        let content =
            serde_yaml::to_string(&prefs).context("Failed to serialize board preferences")?;
        let path = self.file_for(board_id);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write preference file: {:?}", path))?;

        debug!("Saved group-by {} for board {}", group_by, board_id);
        Ok(())
    }
}
