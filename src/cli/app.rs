use crate::cli::actions::{Gtags, SearchFlags};
use crate::cli::config;
use crate::cli::console::ConsoleSurface;
use crate::cli::error::{CliError, Result};
use crate::cli::output::{print_report, OutputStyle};
use crate::runtime::engine::CmdEngine;
use crate::runtime::surface::CancelHandle;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Source code tagging with GNU Global
#[derive(Parser)]
#[command(name = "gtags-cli", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "GTAGS_CLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the gtags and global binaries
    #[arg(long, global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Project directory lookups run against
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    pub dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create (or rebuild) the tag database
    Create {
        /// Project root; defaults to --dir
        path: Option<PathBuf>,
    },

    /// Update the database for a single file
    Update {
        file: PathBuf,

        /// Invoked from a save hook; honours the auto_update setting
        #[arg(long)]
        on_save: bool,
    },

    /// Delete the database covering --dir
    Delete,

    /// Complete a tag, or a file name with --file
    Complete {
        prefix: String,

        #[arg(long)]
        file: bool,
    },

    /// Find files matching a pattern
    File {
        pattern: String,

        #[command(flatten)]
        flags: PatternArgs,
    },

    /// Find the definition of a tag
    Def {
        tag: String,

        #[command(flatten)]
        case: CaseArgs,
    },

    /// Find references to a tag
    Ref {
        tag: String,

        #[command(flatten)]
        case: CaseArgs,
    },

    /// Find symbol occurrences
    Symbol {
        tag: String,

        #[command(flatten)]
        case: CaseArgs,
    },

    /// Search file contents
    Grep {
        pattern: String,

        #[command(flatten)]
        flags: PatternArgs,
    },

    /// Show the GNU Global version
    Version,

    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Case option shared by tag lookups
#[derive(Args, Debug, Clone, Copy)]
pub struct CaseArgs {
    /// Case-sensitive matching
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub match_case: bool,
}

/// Options of pattern searches
#[derive(Args, Debug, Clone, Copy)]
pub struct PatternArgs {
    /// Treat the pattern as a regular expression
    #[arg(short = 'e', long)]
    pub regexp: bool,

    /// Case-sensitive matching
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub match_case: bool,
}

impl From<PatternArgs> for SearchFlags {
    fn from(args: PatternArgs) -> Self {
        Self {
            regexp: args.regexp,
            match_case: args.match_case,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current settings
    Show,

    /// Change one setting
    Set { key: String, value: String },

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self, cancel: CancelHandle) -> Result<()> {
        let config_path = self.config.clone().unwrap_or_else(config::default_path);
        let file_config = config::load_or_default(&config_path);
        let settings = config::merge_with_cli_args(file_config.clone(), self.tools_dir.as_deref());
        debug!(config = %config_path.display(), ?settings, "Loaded settings");

        let style = OutputStyle::from_flag(self.json);
        let surface = ConsoleSurface::new(cancel, self.quiet || self.json);
        let gtags = Gtags::with_engine(CmdEngine::with_surface(settings.clone(), Arc::new(surface)));
        let dir = self.dir;

        match self.command {
            Commands::Create { path } => {
                let path = path.unwrap_or(dir);
                let report = blocking(move || gtags.create_database(&path)).await?;
                print_report(report, style)
            }
            Commands::Update { file, on_save } => {
                if on_save && !settings.auto_update {
                    debug!(file = %file.display(), "auto_update is off, skipping");
                    return Ok(());
                }
                let queued_file = file.clone();
                match blocking(move || gtags.update_file(&file)).await? {
                    Some(report) => print_report(report, style),
                    None => {
                        if !self.quiet {
                            eprintln!(
                                "{} {}",
                                "Database busy, update scheduled for".yellow(),
                                queued_file.display()
                            );
                        }
                        Ok(())
                    }
                }
            }
            Commands::Delete => {
                let deleted = blocking(move || gtags.delete_database(&dir)).await?;
                if !self.quiet {
                    println!("Deleted database in {}", deleted.display());
                }
                Ok(())
            }
            Commands::Complete { prefix, file } => {
                let report = blocking(move || {
                    if file {
                        gtags.autocomplete_file(&dir, &prefix)
                    } else {
                        gtags.autocomplete(&dir, &prefix)
                    }
                })
                .await?;
                print_report(report, style)
            }
            Commands::File { pattern, flags } => {
                let report =
                    blocking(move || gtags.find_file(&dir, &pattern, flags.into())).await?;
                print_report(report, style)
            }
            Commands::Def { tag, case } => {
                let report =
                    blocking(move || gtags.find_definition(&dir, &tag, case.match_case)).await?;
                print_report(report, style)
            }
            Commands::Ref { tag, case } => {
                let report =
                    blocking(move || gtags.find_reference(&dir, &tag, case.match_case)).await?;
                print_report(report, style)
            }
            Commands::Symbol { tag, case } => {
                let report =
                    blocking(move || gtags.find_symbol(&dir, &tag, case.match_case)).await?;
                print_report(report, style)
            }
            Commands::Grep { pattern, flags } => {
                let report = blocking(move || gtags.grep(&dir, &pattern, flags.into())).await?;
                print_report(report, style)
            }
            Commands::Version => {
                let version = blocking(move || Ok(gtags.version())).await?;
                if self.json {
                    println!("{}", serde_json::json!({ "version": version.trim_end() }));
                } else {
                    println!("{}", version.trim_end());
                }
                Ok(())
            }
            Commands::Config { action } => action.execute(&config_path, file_config, self.json),
            Commands::Completion { shell } => {
                generate_completion(shell);
                Ok(())
            }
        }
    }
}

impl ConfigAction {
    fn execute(self, path: &std::path::Path, mut config: crate::core::config::Config, json: bool) -> Result<()> {
        match self {
            ConfigAction::Show => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    let text = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::configuration(e.to_string()))?;
                    print!("{}", text);
                }
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                config::set_key(&mut config, &key, &value)?;
                config.save_to_file(path)?;
                println!("{} {} = {}", "Set".green(), key, value);
                Ok(())
            }
            ConfigAction::Path => {
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}

/// Run a blocking front-end operation off the async runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Generate shell completion script
fn generate_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
