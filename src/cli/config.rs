//! Front-end handling of the engine configuration file

use crate::cli::error::{CliError, Result};
use crate::core::config::{Config, Parser};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Keys accepted by `config set`
pub const KEYS: [&str; 5] = [
    "tools_dir",
    "parser",
    "auto_update",
    "use_library",
    "library_path",
];

/// Location of the configuration file
pub fn default_path() -> PathBuf {
    crate::cli::default_config_dir().join("config.toml")
}

/// Load `path`, falling back to defaults when the file is unreadable
pub fn load_or_default(path: &Path) -> Config {
    match Config::load_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), "Bad config file, default settings will be used: {}", e);
            Config::default()
        }
    }
}

/// Apply command-line overrides on top of the file settings
pub fn merge_with_cli_args(mut config: Config, tools_dir: Option<&Path>) -> Config {
    if let Some(dir) = tools_dir {
        config.tools_dir = Some(dir.to_path_buf());
    }
    config
}

/// Set a single key from its textual value
pub fn set_key(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "tools_dir" => {
            config.tools_dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        "parser" => config.parser = value.parse::<Parser>()?,
        "auto_update" => config.auto_update = parse_bool(key, value)?,
        "use_library" => config.use_library = parse_bool(key, value)?,
        "library_path" => config.library_path = value.to_string(),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown key '{}', expected one of: {}",
                key,
                KEYS.join(", ")
            )))
        }
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(CliError::invalid_input(format!(
            "'{}' expects true or false, got '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_key() {
        let mut config = Config::default();
        set_key(&mut config, "parser", "ctags").unwrap();
        set_key(&mut config, "use_library", "yes").unwrap();
        set_key(&mut config, "library_path", "/usr/include").unwrap();
        set_key(&mut config, "auto_update", "off").unwrap();
        set_key(&mut config, "tools_dir", "/opt/global/bin").unwrap();

        assert_eq!(config.parser, Parser::Ctags);
        assert!(config.use_library);
        assert_eq!(config.library_path, "/usr/include");
        assert!(!config.auto_update);
        assert_eq!(config.tools_dir, Some(PathBuf::from("/opt/global/bin")));

        set_key(&mut config, "tools_dir", "").unwrap();
        assert_eq!(config.tools_dir, None);
    }

    #[test]
    fn test_set_key_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            set_key(&mut config, "colour", "red"),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            set_key(&mut config, "use_library", "maybe"),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            set_key(&mut config, "parser", "exuberant"),
            Err(CliError::Gtags(_))
        ));
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "parser = [").unwrap();
        assert_eq!(load_or_default(&path), Config::default());
    }

    #[test]
    fn test_cli_override_wins() {
        let config = Config {
            tools_dir: Some("/usr/bin".into()),
            ..Config::default()
        };
        let merged = merge_with_cli_args(config, Some(Path::new("/opt/bin")));
        assert_eq!(merged.tools_dir, Some(PathBuf::from("/opt/bin")));
    }
}
