//! Command-line front end for GNU Global.
//! ## Usage
//!
//! ```bash
//! # Build the database for a project
//! gtags-cli create ~/src/project
//!
//! # Look up a definition (falls back to symbols)
//! gtags-cli -C ~/src/project def main
//!
//! # Grep the project, case-insensitive
//! gtags-cli -C ~/src/project grep 'todo' --match-case false
//!
//! # Refresh one file after saving it
//! gtags-cli update ~/src/project/src/main.c
//! ```

pub mod actions;
pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod output;

// Re-export commonly used types
pub use actions::{Gtags, Report, SearchFlags};
pub use console::ConsoleSurface;
pub use error::{CliError, Result, UserFriendlyError};

/// Version information for the front end
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for the configuration file
pub fn default_config_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "gtags-cli")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| {
            // Fallback to home directory if project dirs not available
            dirs::home_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join(".gtags-cli")
        })
}
