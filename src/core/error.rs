use std::path::PathBuf;
use thiserror::Error;

/// Errors raised around the engine
///
/// Tool outcomes are never reported through this type: a run that fails,
/// is cancelled or cannot start finishes with the matching
/// [`CmdStatus`](crate::CmdStatus) on its descriptor. `Error` covers API
/// misuse and the infrastructure the engine depends on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("A run is already in progress for '{0}'")]
    AlreadyRunning(String),

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("GTags binaries not found in {}", .0.display())]
    ToolsNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Convenient result type for the engine
pub type Result<T> = std::result::Result<T, Error>;
