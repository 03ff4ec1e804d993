use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing persisted map state
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Storage I/O failed for map '{map_id}': {source}")]
    Io {
        map_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Map '{map_id}' is not valid JSON: {source}")]
    Json {
        map_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Map storage is unavailable: {0}")]
    Unavailable(String),
}

/// Errors from loading or saving the editor configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}
