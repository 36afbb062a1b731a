//! Reconciliation configuration.
//!
//! Names the cached queries the built-in mutation handlers update, where the
//! moderation listing keeps its nodes, and which user statuses take a user
//! out of that listing.
//!
//! Configuration is stored at `~/.config/querysync/config.json`. A missing
//! file yields the defaults; `QUERYSYNC_*` environment variables override
//! individual fields.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::UserStatus;
use crate::keyed::FieldPath;

/// Application name used for the config directory path
const APP_NAME: &str = "querysync";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_LISTING_PATH: &str = "QUERYSYNC_LISTING_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Query holding the moderation listing of users.
    pub community_query: String,
    /// Query holding the settings snapshot.
    pub configure_query: String,
    /// Location of the node sequence inside the community query result.
    pub listing_path: FieldPath,
    /// Field of the configure query result that holds the settings object.
    pub settings_field: String,
    /// Statuses that remove a user from the moderation listing.
    pub removing_statuses: Vec<UserStatus>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            community_query: "TalkAdmin_Community".to_string(),
            configure_query: "TalkAdmin_Configure".to_string(),
            listing_path: FieldPath::new(["users", "nodes"]),
            settings_field: "settings".to_string(),
            removing_statuses: vec![UserStatus::Approved],
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_LISTING_PATH) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match FieldPath::parse(trimmed) {
                    Ok(path) => self.listing_path = path,
                    Err(err) => {
                        tracing::warn!("invalid {ENV_LISTING_PATH}, ignoring: {err}");
                    }
                }
            }
        }
    }
}
