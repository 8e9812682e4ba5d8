use std::path::PathBuf;
use thiserror::Error;

/// Failures that cross a module boundary.
///
/// User-input and transport problems never surface as `Err` to callers of the
/// session layer; they become local ERROR messages in the affected buffer.
/// This type covers the config store and bootstrap paths, where a real error
/// value is the right shape.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize user config: {0}")]
    SerializeConfig(#[from] toml::ser::Error),

    #[error("unknown user {0}")]
    UnknownUser(String),
}
