use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default location of the sound manifest, relative to the resource directory
pub const DEFAULT_MANIFEST_PATH: &str = "data/sounds/stensounds.properties";

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

fn default_volume() -> u8 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Directory that manifest and archive paths are resolved against
    pub resource_dir: PathBuf,

    /// Manifest location relative to `resource_dir`
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// System volume restored at startup (0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Mute switch restored at startup
    #[serde(default)]
    pub mute: bool,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("."),
            manifest_path: default_manifest_path(),
            volume: default_volume(),
            mute: false,
        }
    }
}

impl SoundConfig {
    /// Config rooted at `resource_dir` with all other settings at their defaults
    pub fn with_resource_dir(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the app's config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            tracing::info!("Loaded sound config from: {}", config_path.display());
            Ok(config)
        } else {
            let config = SoundConfig::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default sound config at: {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: SoundConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.volume > 100 {
            return Err(ConfigError::Invalid(format!(
                "volume must be within 0..=100, got {}",
                self.volume
            )));
        }
        if self.manifest_path.trim().is_empty() {
            return Err(ConfigError::Invalid("manifest path is empty".to_string()));
        }
        Ok(())
    }

    /// Absolute location of the manifest
    pub fn manifest_file(&self) -> PathBuf {
        self.resource_dir.join(&self.manifest_path)
    }

    /// Get the config file path (in app's base directory)
    fn config_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "<current exe>".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("Could not determine executable directory".into()))?;

        Ok(exe_dir.join("config").join("sound.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SoundConfig::default();
        assert_eq!(config.manifest_path, DEFAULT_MANIFEST_PATH);
        assert_eq!(config.volume, 100);
        assert!(!config.mute);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: SoundConfig = serde_json::from_str(r#"{"resource_dir": "/opt/stendhal"}"#).unwrap();
        assert_eq!(config.resource_dir, PathBuf::from("/opt/stendhal"));
        assert_eq!(config.manifest_path, DEFAULT_MANIFEST_PATH);
        assert_eq!(config.volume, 100);
    }

    #[test]
    fn test_invalid_volume_rejected() {
        let config = SoundConfig {
            volume: 101,
            ..SoundConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sound.json");

        let config = SoundConfig {
            volume: 40,
            mute: true,
            ..SoundConfig::with_resource_dir(dir.path())
        };
        config.save_to(&path).unwrap();

        let loaded = SoundConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_manifest_file_joins_resource_dir() {
        let config = SoundConfig::with_resource_dir("/res");
        assert_eq!(
            config.manifest_file(),
            PathBuf::from("/res/data/sounds/stensounds.properties")
        );
    }
}
