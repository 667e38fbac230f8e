use std::path::PathBuf;
use thiserror::Error;

/// Exit code used when the user interrupts a run
pub const EXIT_CANCELLED: i32 = 130;

/// Error type for the gtags command-line front end
#[derive(Error, Debug)]
pub enum CliError {
    #[error("No database covers {0}")]
    NoDatabase(PathBuf),

    #[error("Database is in use: {0}")]
    DatabaseInUse(PathBuf),

    #[error("Failed to delete database: {0}")]
    DeleteFailed(PathBuf),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Lookup failed: {0}")]
    Failed(String),

    #[error("Running GTags failed")]
    RunFailed,

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GTags error: {0}")]
    Gtags(#[from] crate::core::error::Error),

    #[error("Async task error: {0}")]
    AsyncTask(#[from] tokio::task::JoinError),
}

impl CliError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => EXIT_CANCELLED,
            Self::InvalidInput(_) | Self::Unsupported(_) => 2,
            _ => 1,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDatabase(path) => format!(
                "No GTags database found for '{}'. Run 'gtags-cli create <dir>' first.",
                path.display()
            ),
            Self::DatabaseInUse(path) => format!(
                "Database '{}' is in use. Try again when the current operation completes.",
                path.display()
            ),
            Self::Failed(result) => format!("{}\nTry re-creating database.", result.trim_end()),
            Self::Gtags(crate::core::error::Error::ToolsNotFound(dir)) => format!(
                "GTags binaries not found in '{}'. Install GNU Global or pass --tools-dir.",
                dir.display()
            ),
            Self::Gtags(crate::core::error::Error::AlreadyRunning(kind)) => format!(
                "A {} run is already in progress. Wait for it to complete.",
                kind
            ),
            Self::Cancelled => String::new(),
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for the front end
pub type Result<T> = std::result::Result<T, CliError>;

/// Trait for converting errors to user-friendly messages
pub trait UserFriendlyError {
    fn user_message(&self) -> String;
}

impl UserFriendlyError for CliError {
    fn user_message(&self) -> String {
        self.user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use std::io;

    #[test]
    fn test_error_creation_helpers() {
        match CliError::configuration("bad toml") {
            CliError::Configuration(msg) => assert_eq!(msg, "bad toml"),
            _ => panic!("Expected Configuration error"),
        }

        match CliError::invalid_input("empty tag") {
            CliError::InvalidInput(msg) => assert_eq!(msg, "empty tag"),
            _ => panic!("Expected InvalidInput error"),
        }

        match CliError::unsupported("references with ctags") {
            CliError::Unsupported(msg) => assert_eq!(msg, "references with ctags"),
            _ => panic!("Expected Unsupported error"),
        }
    }

    #[test]
    fn test_failed_suggests_rebuild() {
        let err = CliError::Failed("global: GTAGS not found.\n".into());
        assert_eq!(
            err.user_message(),
            "global: GTAGS not found.\nTry re-creating database."
        );
    }

    #[test]
    fn test_run_failed_message() {
        assert_eq!(CliError::RunFailed.user_message(), "Running GTags failed");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert!(CliError::Cancelled.user_message().is_empty());
        assert_eq!(CliError::invalid_input("x").exit_code(), 2);
        assert_eq!(CliError::RunFailed.exit_code(), 1);
    }

    #[test]
    fn test_error_conversions() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: CliError = io_err.into();
        assert!(matches!(err, CliError::Io(_)));

        let err: CliError = Error::ToolsNotFound("/opt/global/bin".into()).into();
        assert!(err.user_message().contains("--tools-dir"));

        let err: CliError = Error::AlreadyRunning("grep".into()).into();
        assert!(err.user_message().contains("already in progress"));
    }

    #[test]
    fn test_user_friendly_trait() {
        let err = CliError::DatabaseInUse("/work".into());
        let msg = UserFriendlyError::user_message(&err);
        assert!(msg.contains("/work"));
        assert!(msg.contains("in use"));
    }
}
