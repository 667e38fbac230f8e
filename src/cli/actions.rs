//! User-level GTags operations
//!
//! Glue between the engine, the database registry and the scheduled-update
//! queue. Every method runs to completion before returning and hands back a
//! [`Report`] of the finished descriptor.

use crate::cli::error::{CliError, Result};
use crate::core::cmd::{Cmd, CmdHandle, CmdId, CmdOutcome, CmdStatus};
use crate::core::config::Parser;
use crate::db::{absolute, DbHandle, DbManager, DbRegistry, UpdateQueue};
use crate::runtime::engine::CmdEngine;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text returned by [`Gtags::version`] when the tools cannot be queried
pub const VERSION_READ_FAILED: &str = "VERSION READ FAILED";

/// Matching options of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFlags {
    /// Treat the pattern as a regular expression
    pub regexp: bool,
    pub match_case: bool,
}

impl Default for SearchFlags {
    fn default() -> Self {
        Self::literal(true)
    }
}

impl SearchFlags {
    pub fn literal(match_case: bool) -> Self {
        Self {
            regexp: false,
            match_case,
        }
    }
}

/// Snapshot of a finished descriptor
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kind: CmdId,
    pub name: String,
    pub tag: String,
    pub db_path: PathBuf,
    #[serde(flatten)]
    pub outcome: CmdOutcome,
}

impl Report {
    pub fn from_cmd(cmd: &Cmd) -> Self {
        let request = cmd.request();
        Self {
            kind: request.id,
            name: request.name,
            tag: request.tag,
            db_path: cmd.db_path().to_path_buf(),
            outcome: cmd.outcome(),
        }
    }

    pub fn status(&self) -> CmdStatus {
        self.outcome.status
    }

    /// Turn non-Ok terminal statuses into errors
    pub fn into_result(self) -> Result<Self> {
        match self.outcome.status {
            CmdStatus::Failed => Err(CliError::Failed(self.outcome.result)),
            CmdStatus::RunError => Err(CliError::RunFailed),
            CmdStatus::Cancelled => Err(CliError::Cancelled),
            _ => Ok(self),
        }
    }

    /// Text shown for an Ok run
    pub fn message(&self) -> String {
        if !self.outcome.result.is_empty() {
            return self.outcome.result.clone();
        }
        match self.kind {
            CmdId::CreateDatabase => format!("Database created in {}", self.db_path.display()),
            CmdId::UpdateSingle => format!("Updated {}", self.tag),
            _ => format!("\"{}\" not found", self.tag),
        }
    }
}

/// GTags operations over one engine, registry and update queue
#[derive(Clone)]
pub struct Gtags {
    engine: CmdEngine,
    registry: Arc<dyn DbRegistry>,
    updates: Arc<UpdateQueue>,
}

impl Gtags {
    pub fn new(engine: CmdEngine, registry: Arc<dyn DbRegistry>, updates: Arc<UpdateQueue>) -> Self {
        Self {
            engine,
            registry,
            updates,
        }
    }

    /// Operations backed by an in-process [`DbManager`]
    pub fn with_engine(engine: CmdEngine) -> Self {
        Self::new(engine, Arc::new(DbManager::new()), Arc::new(UpdateQueue::new()))
    }

    pub fn engine(&self) -> &CmdEngine {
        &self.engine
    }

    pub fn updates(&self) -> &UpdateQueue {
        &self.updates
    }

    /// Build (or rebuild) the database rooted at `dir`
    pub fn create_database(&self, dir: &Path) -> Result<Report> {
        let db = if self.registry.exists_in(dir) {
            match self.registry.acquire(dir, true) {
                Some((db, true)) => db,
                Some((db, false)) => return Err(CliError::DatabaseInUse(db.path().to_path_buf())),
                None => return Err(CliError::NoDatabase(dir.to_path_buf())),
            }
        } else {
            self.registry.register_new(dir)
        };

        let cmd = Cmd::builder(CmdId::CreateDatabase).db(db.clone()).build();
        self.engine.run(&cmd, None);

        if cmd.status() == CmdStatus::Ok {
            self.registry.release(&db);
        } else {
            warn!(db = %db.path().display(), status = %cmd.status(), "Database creation did not succeed, removing it");
            self.registry.unregister(&db);
        }
        self.run_scheduled_updates(db.path());

        Ok(Report::from_cmd(&cmd))
    }

    /// Refresh a single file; returns `None` when the database was busy and
    /// the update has been queued
    pub fn update_file(&self, file: &Path) -> Result<Option<Report>> {
        let file = &absolute(file);
        let (db, granted) = self
            .registry
            .acquire(file, true)
            .ok_or_else(|| CliError::NoDatabase(file.to_path_buf()))?;

        if !granted {
            if self.updates.enqueue_if_absent(file) {
                info!(file = %file.display(), "Database busy, update scheduled");
            }
            return Ok(None);
        }

        let cmd = self.run_update(&db, file);
        self.registry.release(&db);
        self.run_scheduled_updates(db.path());

        Ok(Some(Report::from_cmd(&cmd)))
    }

    /// Tags and then symbols starting with `prefix`
    pub fn autocomplete(&self, path: &Path, prefix: &str) -> Result<Report> {
        self.with_reader(path, |db| {
            let cmd = Cmd::builder(CmdId::AutoComplete).db(db).tag(prefix).build();
            if self.engine.run(&cmd, None) {
                cmd.set_id(CmdId::AutoCompleteSymbol)?;
                self.engine.run(&cmd, None);
            }
            Ok(cmd)
        })
    }

    /// File names containing `prefix`
    pub fn autocomplete_file(&self, path: &Path, prefix: &str) -> Result<Report> {
        let tag = format!("/{}", prefix);
        self.lookup(CmdId::AutoCompleteFile, path, &tag, SearchFlags::default())
    }

    pub fn find_file(&self, path: &Path, pattern: &str, flags: SearchFlags) -> Result<Report> {
        self.lookup(CmdId::FindFile, path, pattern, flags)
    }

    /// Definitions of `tag`, falling back to a symbol search when none exist
    pub fn find_definition(&self, path: &Path, tag: &str, match_case: bool) -> Result<Report> {
        self.lookup_or_symbol(CmdId::FindDefinition, path, tag, match_case)
    }

    /// References to `tag`, falling back to a symbol search when none exist
    pub fn find_reference(&self, path: &Path, tag: &str, match_case: bool) -> Result<Report> {
        let parser = self.engine.config().parser;
        if !parser.supports_references() {
            return Err(CliError::unsupported(format!(
                "references are not available with the {} parser",
                Parser::Ctags
            )));
        }
        self.lookup_or_symbol(CmdId::FindReference, path, tag, match_case)
    }

    pub fn find_symbol(&self, path: &Path, tag: &str, match_case: bool) -> Result<Report> {
        self.lookup(CmdId::FindSymbol, path, tag, SearchFlags::literal(match_case))
    }

    pub fn grep(&self, path: &Path, pattern: &str, flags: SearchFlags) -> Result<Report> {
        self.lookup(CmdId::Grep, path, pattern, flags)
    }

    /// Delete the database covering `path`; returns its directory
    pub fn delete_database(&self, path: &Path) -> Result<PathBuf> {
        let (db, granted) = self
            .registry
            .acquire(path, true)
            .ok_or_else(|| CliError::NoDatabase(path.to_path_buf()))?;
        if !granted {
            return Err(CliError::DatabaseInUse(db.path().to_path_buf()));
        }

        let dir = db.path().to_path_buf();
        if !self.registry.unregister(&db) {
            return Err(CliError::DeleteFailed(dir));
        }
        info!(db = %dir.display(), "Database deleted");
        Ok(dir)
    }

    /// Version banner of the installed tools
    pub fn version(&self) -> String {
        let cmd = Cmd::new(CmdId::Version, PathBuf::new(), "");
        if self.engine.run(&cmd, None) && cmd.has_result() {
            cmd.result()
        } else {
            VERSION_READ_FAILED.to_string()
        }
    }

    fn lookup(&self, id: CmdId, path: &Path, tag: &str, flags: SearchFlags) -> Result<Report> {
        require_tag(tag)?;
        self.with_reader(path, |db| {
            let cmd = search_cmd(id, db, tag, flags);
            self.engine.run(&cmd, None);
            Ok(cmd)
        })
    }

    /// Run `id`; an Ok run that found nothing is retried as a symbol search
    fn lookup_or_symbol(&self, id: CmdId, path: &Path, tag: &str, match_case: bool) -> Result<Report> {
        require_tag(tag)?;
        self.with_reader(path, |db| {
            let cmd = search_cmd(id, db, tag, SearchFlags::literal(match_case));
            if self.engine.run(&cmd, None) && !cmd.has_result() {
                debug!(tag, kind = %id, "Nothing found, searching symbols");
                cmd.set_id(CmdId::FindSymbol)?;
                cmd.set_name(CmdId::FindSymbol.display_name())?;
                self.engine.run(&cmd, None);
            }
            Ok(cmd)
        })
    }

    /// Run `f` with read access to the database covering `path`
    fn with_reader<F>(&self, path: &Path, f: F) -> Result<Report>
    where
        F: FnOnce(DbHandle) -> Result<CmdHandle>,
    {
        let (db, granted) = self
            .registry
            .acquire(path, false)
            .ok_or_else(|| CliError::NoDatabase(path.to_path_buf()))?;
        if !granted {
            return Err(CliError::DatabaseInUse(db.path().to_path_buf()));
        }

        let cmd = f(db.clone());
        self.registry.release(&db);
        self.run_scheduled_updates(db.path());

        let cmd = cmd?;
        Ok(Report::from_cmd(&cmd))
    }

    fn run_update(&self, db: &DbHandle, file: &Path) -> CmdHandle {
        let cmd = Cmd::builder(CmdId::UpdateSingle)
            .db(db.clone())
            .tag(file.to_string_lossy())
            .build();
        self.engine.run(&cmd, None);
        cmd
    }

    /// Run updates parked for `db_dir` while the database is free
    fn run_scheduled_updates(&self, db_dir: &Path) {
        while let Some(file) = self.updates.take_matching(db_dir) {
            match self.registry.acquire(&file, true) {
                Some((db, true)) => {
                    info!(file = %file.display(), "Running scheduled update");
                    let cmd = self.run_update(&db, &file);
                    if cmd.status() != CmdStatus::Ok {
                        warn!(file = %file.display(), status = %cmd.status(), "Scheduled update did not succeed");
                    }
                    self.registry.release(&db);
                }
                Some((_, false)) => {
                    self.updates.enqueue_if_absent(file);
                    break;
                }
                None => warn!(file = %file.display(), "Dropping scheduled update, database is gone"),
            }
        }
    }
}

fn search_cmd(id: CmdId, db: DbHandle, tag: &str, flags: SearchFlags) -> CmdHandle {
    Cmd::builder(id)
        .db(db)
        .tag(tag)
        .regexp(flags.regexp)
        .match_case(flags.match_case)
        .build()
}

fn require_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        Err(CliError::invalid_input("empty search text"))
    } else {
        Ok(())
    }
}
