//! Command-line composition
//!
//! Maps a descriptor to the exact `gtags`/`global` invocation. Composition
//! never fails; a tools directory that does not exist surfaces later as a
//! launch error.

use crate::core::cmd::{CmdId, CmdRequest};
use crate::core::config::{binary_name, Config, GLOBAL_BIN, GTAGS_BIN, GTAGS_CONF};
use std::fmt;
use std::path::{Path, PathBuf};

/// Program and arguments for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    quoted: Vec<bool>,
}

impl Invocation {
    fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            quoted: Vec::new(),
        }
    }

    fn flag(mut self, flag: impl Into<String>) -> Self {
        self.args.push(flag.into());
        self.quoted.push(false);
        self
    }

    fn quoted(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self.quoted.push(true);
        self
    }

    /// Compose the invocation for `request` with binaries taken from `tools_dir`
    pub fn compose(request: &CmdRequest, tools_dir: &Path, config: &Config) -> Self {
        let bin = if request.id.writes_database() {
            GTAGS_BIN
        } else {
            GLOBAL_BIN
        };
        let mut inv = Self::new(tools_dir.join(binary_name(bin)));

        inv = match request.id {
            CmdId::CreateDatabase => inv.flag("-c").flag("--skip-unreadable"),
            CmdId::UpdateSingle => inv
                .flag("-c")
                .flag("--skip-unreadable")
                .flag("--single-update"),
            CmdId::AutoComplete => inv.flag("-cT"),
            CmdId::AutoCompleteSymbol => inv.flag("-cs"),
            CmdId::AutoCompleteFile => inv.flag("-cP").flag("--match-part=all"),
            CmdId::FindFile => inv.flag("-P"),
            CmdId::FindDefinition => inv.flag("-dT").flag("--result=grep"),
            CmdId::FindReference => inv.flag("-r").flag("--result=grep"),
            CmdId::FindSymbol => inv.flag("-s").flag("--result=grep"),
            CmdId::Grep => inv.flag("-g").flag("--result=grep"),
            CmdId::Version => inv.flag("--version"),
        };

        if request.id.takes_argument() {
            inv = inv.quoted(request.tag.clone());
        }

        if request.id.writes_database() {
            let conf = tools_dir.join(GTAGS_CONF);
            if conf.is_file() {
                inv = inv
                    .flag("--gtagsconf")
                    .quoted(conf.to_string_lossy().into_owned())
                    .flag(format!("--gtagslabel={}", config.parser.label()));
            }
        } else if request.id.is_search() {
            inv = inv.flag(if request.match_case { "-M" } else { "-i" });
            if !request.regexp {
                inv = inv.flag("--literal");
            }
        }

        inv
    }

    /// The literal command line, as a shell would read it
    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.program.display())?;
        for (arg, quoted) in self.args.iter().zip(&self.quoted) {
            if *quoted {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
