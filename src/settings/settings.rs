// Settings management and persistence
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::player::DEFAULT_VOLUME;

const SETTINGS_FILE: &str = "tonearm.json";

/// Player preferences persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
        }
    }
}

impl PlayerSettings {
    fn settings_path(config_dir: &Path) -> PathBuf {
        config_dir.join(SETTINGS_FILE)
    }

    /// Load settings, falling back to defaults when no file exists yet
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = Self::settings_path(config_dir);

        if !path.exists() {
            debug!("no settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;

        let mut settings: PlayerSettings =
            serde_json::from_str(&content).context("Failed to parse settings")?;
        settings.volume = settings.volume.clamp(0.0, 1.0);

        info!("loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to the config directory
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create settings directory {:?}", config_dir))?;

        let path = Self::settings_path(config_dir);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings file {:?}", path))?;

        info!("saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(settings.volume, DEFAULT_VOLUME);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlayerSettings { volume: 0.75 };
        settings.save(dir.path()).unwrap();

        let loaded = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.volume, 0.75);
    }

    #[test]
    fn test_out_of_range_volume_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), r#"{"volume": 3.0}"#).unwrap();

        let loaded = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.volume, 1.0);
    }
}
