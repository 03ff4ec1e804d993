//! Editor configuration
//!
//! Stored as TOML in the platform config directory:
//! - Linux: ~/.config/battlemap/config.toml
//! - macOS: ~/Library/Application Support/battlemap/config.toml
//! - Windows: %APPDATA%\battlemap\config\config.toml

use crate::error::ConfigError;
use battlemap_render::RenderSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last change before the map is saved
    pub autosave_debounce_ms: u64,
    /// How long transient notices stay up
    pub notice_duration_ms: u64,
    /// Pixels at or below this alpha are click-through
    pub alpha_threshold: u8,
    pub snap_to_grid: bool,
    /// Seed for maps that do not carry one
    pub default_seed: String,
    /// Where map blobs are written; the platform data directory when unset
    pub storage_dir: Option<PathBuf>,
    /// Action name -> key combo, overriding the defaults
    pub keybindings: HashMap<String, String>,
    pub render: RenderSettings,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 500,
            notice_duration_ms: 2000,
            alpha_threshold: 8,
            snap_to_grid: true,
            default_seed: "battlemap".to_string(),
            storage_dir: None,
            keybindings: HashMap::new(),
            render: RenderSettings::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "battlemap")
}

/// Location of the config file, if the platform has a config directory
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Default directory for map blobs
pub fn default_storage_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("maps"))
}

impl EditorConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    /// Configured storage directory, else the platform default
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(default_storage_dir)
    }

    /// Load from the platform config file. A missing file gives defaults;
    /// an unreadable or invalid one is logged and also gives defaults.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Using default editor config: {err}");
                Self::default()
            }
        }
    }

    /// Load from a specific file; a missing file gives defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to the platform config file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.autosave_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
alpha_threshold = 32
snap_to_grid = false

[keybindings]
undo = "Ctrl+U"

[render]
darkness_opacity = 0.5
"#,
        )
        .unwrap();

        let config = EditorConfig::load_from(&path).unwrap();
        assert_eq!(config.alpha_threshold, 32);
        assert!(!config.snap_to_grid);
        assert_eq!(config.keybindings.get("undo").map(String::as_str), Some("Ctrl+U"));
        assert_eq!(config.render.darkness_opacity, 0.5);
        assert_eq!(config.notice_duration_ms, 2000);
        assert_eq!(config.render.light_rays, RenderSettings::default().light_rays);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "alpha_threshold = \"lots\"").unwrap();
        assert!(matches!(
            EditorConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = EditorConfig::default();
        config.default_seed = "dungeon".to_string();
        config.storage_dir = Some(dir.path().join("maps"));
        config.save_to(&path).unwrap();

        assert_eq!(EditorConfig::load_from(&path).unwrap(), config);
    }
}
