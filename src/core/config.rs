use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the `global` lookup binary
pub const GLOBAL_BIN: &str = "global";

/// Name of the `gtags` indexing binary
pub const GTAGS_BIN: &str = "gtags";

/// Tool configuration file looked up beside the binaries
pub const GTAGS_CONF: &str = "gtags.conf";

/// Parser used by `gtags` when building a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parser {
    #[default]
    Default,
    Ctags,
    Pygments,
}

impl Parser {
    /// Label passed as `--gtagslabel`
    pub fn label(self) -> &'static str {
        match self {
            Parser::Default => "default",
            Parser::Ctags => "ctags",
            Parser::Pygments => "pygments",
        }
    }

    /// Whether databases built with this parser hold references
    pub fn supports_references(self) -> bool {
        self != Parser::Ctags
    }
}

impl fmt::Display for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Parser {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "default" => Ok(Parser::Default),
            "ctags" => Ok(Parser::Ctags),
            "pygments" => Ok(Parser::Pygments),
            other => Err(Error::configuration(format!("unknown parser '{}'", other))),
        }
    }
}

/// Settings read by the engine when composing and launching a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `gtags` and `global`; looked up on `PATH` when unset
    pub tools_dir: Option<PathBuf>,

    #[serde(default)]
    pub parser: Parser,

    /// Update the database when a file is saved
    #[serde(default = "default_true")]
    pub auto_update: bool,

    /// Export `GTAGSLIBPATH` to library-aware lookups
    #[serde(default)]
    pub use_library: bool,

    #[serde(default)]
    pub library_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools_dir: None,
            parser: Parser::Default,
            auto_update: default_true(),
            use_library: false,
            library_path: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating a default one if missing
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Value of `GTAGSLIBPATH` handed to library-aware lookups
    pub fn library_env(&self) -> &str {
        if self.use_library {
            &self.library_path
        } else {
            ""
        }
    }

    /// Directory the binaries are launched from
    ///
    /// Never fails: when nothing is configured and `global` is not on `PATH`
    /// the empty path is returned and the launch itself reports the problem.
    pub fn tools_dir_or_default(&self) -> PathBuf {
        self.resolve_tools_dir().unwrap_or_else(|_| {
            self.tools_dir.clone().unwrap_or_default()
        })
    }

    /// Locate a directory containing both `gtags` and `global`
    pub fn resolve_tools_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.tools_dir {
            return if has_binaries(dir) {
                Ok(dir.clone())
            } else {
                Err(Error::ToolsNotFound(dir.clone()))
            };
        }

        let global = which::which(GLOBAL_BIN)
            .map_err(|_| Error::ToolsNotFound(PathBuf::from(GLOBAL_BIN)))?;
        let dir = global
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if has_binaries(&dir) {
            Ok(dir)
        } else {
            Err(Error::ToolsNotFound(dir))
        }
    }
}

/// Platform file name of a tool binary
pub fn binary_name(bin: &str) -> String {
    format!("{}{}", bin, std::env::consts::EXE_SUFFIX)
}

fn has_binaries(dir: &Path) -> bool {
    dir.join(binary_name(GLOBAL_BIN)).is_file() && dir.join(binary_name(GTAGS_BIN)).is_file()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.parser, Parser::Default);
        assert!(config.auto_update);
        assert!(!config.use_library);
        assert!(config.tools_dir.is_none());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("gtags-engine.toml");

        let config = Config {
            tools_dir: Some(PathBuf::from("/opt/global/bin")),
            parser: Parser::Pygments,
            auto_update: false,
            use_library: true,
            library_path: "/usr/include".to_string(),
        };
        config.save_to_file(&config_path).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_file_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config::load_from_file(&config_path).unwrap();
        assert!(config_path.exists());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_and_bad_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        std::fs::write(&config_path, "parser = \"ctags\"\n").unwrap();
        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.parser, Parser::Ctags);
        assert!(config.auto_update);

        std::fs::write(&config_path, "parser = \"yacc\"\n").unwrap();
        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(Error::TomlDe(_))
        ));
    }

    #[test]
    fn test_library_env() {
        let mut config = Config {
            library_path: "/usr/include".to_string(),
            ..Config::default()
        };
        assert_eq!(config.library_env(), "");
        config.use_library = true;
        assert_eq!(config.library_env(), "/usr/include");
    }

    #[test]
    fn test_parser_labels() {
        assert_eq!("ctags".parse::<Parser>().unwrap(), Parser::Ctags);
        assert_eq!(Parser::Pygments.to_string(), "pygments");
        assert!("yacc".parse::<Parser>().is_err());
        assert!(!Parser::Ctags.supports_references());
        assert!(Parser::Default.supports_references());
    }

    #[test]
    fn test_resolve_configured_tools_dir() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            tools_dir: Some(temp_dir.path().to_path_buf()),
            ..Config::default()
        };
        assert!(matches!(
            config.resolve_tools_dir(),
            Err(Error::ToolsNotFound(_))
        ));
        assert_eq!(config.tools_dir_or_default(), temp_dir.path());

        std::fs::write(temp_dir.path().join(binary_name(GLOBAL_BIN)), "").unwrap();
        std::fs::write(temp_dir.path().join(binary_name(GTAGS_BIN)), "").unwrap();
        assert_eq!(config.resolve_tools_dir().unwrap(), temp_dir.path());
    }
}
