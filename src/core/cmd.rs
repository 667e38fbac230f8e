//! Command descriptor
//!
//! A [`Cmd`] is the request/result record for one tool invocation. It is
//! shared between the caller and the engine's worker as a [`CmdHandle`]
//! (`Arc<Cmd>`) and lives as long as either side still holds it.

use crate::core::error::{Error, Result};
use crate::db::DbHandle;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to a command descriptor
pub type CmdHandle = Arc<Cmd>;

/// Operation performed by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CmdId {
    CreateDatabase,
    UpdateSingle,
    AutoComplete,
    AutoCompleteSymbol,
    AutoCompleteFile,
    FindFile,
    FindDefinition,
    FindReference,
    FindSymbol,
    Grep,
    Version,
}

impl CmdId {
    pub const ALL: [CmdId; 11] = [
        CmdId::CreateDatabase,
        CmdId::UpdateSingle,
        CmdId::AutoComplete,
        CmdId::AutoCompleteSymbol,
        CmdId::AutoCompleteFile,
        CmdId::FindFile,
        CmdId::FindDefinition,
        CmdId::FindReference,
        CmdId::FindSymbol,
        CmdId::Grep,
        CmdId::Version,
    ];

    /// Name shown in progress headers and messages
    pub fn display_name(self) -> &'static str {
        match self {
            CmdId::CreateDatabase => "Create Database",
            CmdId::UpdateSingle => "Database Single File Update",
            CmdId::AutoComplete => "AutoComplete",
            CmdId::AutoCompleteSymbol => "AutoComplete",
            CmdId::AutoCompleteFile => "AutoComplete Filename",
            CmdId::FindFile => "Find File",
            CmdId::FindDefinition => "Find Definition",
            CmdId::FindReference => "Find Reference",
            CmdId::FindSymbol => "Find Symbol",
            CmdId::Grep => "Search",
            CmdId::Version => "About",
        }
    }

    /// Operations that write the database (run through `gtags`)
    pub fn writes_database(self) -> bool {
        matches!(self, CmdId::CreateDatabase | CmdId::UpdateSingle)
    }

    /// Lookup operations that take the case and literal modifiers
    pub fn is_search(self) -> bool {
        !self.writes_database() && self != CmdId::Version
    }

    /// Whether the tag text is substituted into the command line
    pub fn takes_argument(self) -> bool {
        !matches!(self, CmdId::CreateDatabase | CmdId::Version)
    }

    /// Whether the child gets `GTAGSLIBPATH`
    pub fn uses_library_path(self) -> bool {
        matches!(self, CmdId::AutoComplete | CmdId::FindDefinition)
    }
}

impl fmt::Display for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmdId::CreateDatabase => "create-database",
            CmdId::UpdateSingle => "update-single",
            CmdId::AutoComplete => "autocomplete",
            CmdId::AutoCompleteSymbol => "autocomplete-symbol",
            CmdId::AutoCompleteFile => "autocomplete-file",
            CmdId::FindFile => "find-file",
            CmdId::FindDefinition => "find-definition",
            CmdId::FindReference => "find-reference",
            CmdId::FindSymbol => "find-symbol",
            CmdId::Grep => "grep",
            CmdId::Version => "version",
        };
        f.write_str(s)
    }
}

/// Run status
///
/// `Pending` until the first run starts, `Running` while the worker owns
/// the descriptor, then exactly one terminal value per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmdStatus {
    Pending,
    Running,
    Ok,
    Failed,
    RunError,
    Cancelled,
}

impl CmdStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CmdStatus::Pending | CmdStatus::Running)
    }
}

impl fmt::Display for CmdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmdStatus::Pending => "pending",
            CmdStatus::Running => "running",
            CmdStatus::Ok => "ok",
            CmdStatus::Failed => "failed",
            CmdStatus::RunError => "run error",
            CmdStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Caller-owned parameters of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdRequest {
    pub id: CmdId,
    pub name: String,
    pub tag: String,
    pub regexp: bool,
    pub match_case: bool,
}

/// Engine-owned result of the last run
#[derive(Debug, Clone, Serialize)]
pub struct CmdOutcome {
    pub status: CmdStatus,
    pub result: String,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code when the child exited on its own
    pub exit_code: Option<i32>,
}

impl Default for CmdOutcome {
    fn default() -> Self {
        Self {
            status: CmdStatus::Pending,
            result: String::new(),
            run_id: None,
            started_at: None,
            finished_at: None,
            exit_code: None,
        }
    }
}

/// How a finished run changes the result buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResultUpdate {
    Keep,
    Append(String),
    Replace(String),
}

/// Command descriptor
#[derive(Debug)]
pub struct Cmd {
    db_path: PathBuf,
    db: Option<DbHandle>,
    request: RwLock<CmdRequest>,
    outcome: Mutex<CmdOutcome>,
    in_flight: AtomicBool,
}

impl Cmd {
    /// Create a descriptor; this never starts a run
    pub fn new(id: CmdId, db_path: impl Into<PathBuf>, tag: impl Into<String>) -> CmdHandle {
        Self::builder(id).db_path(db_path).tag(tag).build()
    }

    pub fn builder(id: CmdId) -> CmdBuilder {
        CmdBuilder::new(id)
    }

    pub fn id(&self) -> CmdId {
        self.request.read().id
    }

    pub fn name(&self) -> String {
        self.request.read().name.clone()
    }

    pub fn tag(&self) -> String {
        self.request.read().tag.clone()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn db(&self) -> Option<&DbHandle> {
        self.db.as_ref()
    }

    /// Snapshot of the request parameters
    pub fn request(&self) -> CmdRequest {
        self.request.read().clone()
    }

    /// Snapshot of the last outcome
    pub fn outcome(&self) -> CmdOutcome {
        self.outcome.lock().clone()
    }

    pub fn status(&self) -> CmdStatus {
        self.outcome.lock().status
    }

    pub fn result(&self) -> String {
        self.outcome.lock().result.clone()
    }

    pub fn has_result(&self) -> bool {
        !self.outcome.lock().result.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Switch the operation, e.g. for a fallback second pass
    pub fn set_id(&self, id: CmdId) -> Result<()> {
        self.update_request(|r| r.id = id)
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update_request(|r| r.name = name)
    }

    pub fn set_tag(&self, tag: impl Into<String>) -> Result<()> {
        let tag = tag.into();
        self.update_request(|r| r.tag = tag)
    }

    pub fn set_regexp(&self, regexp: bool) -> Result<()> {
        self.update_request(|r| r.regexp = regexp)
    }

    pub fn set_match_case(&self, match_case: bool) -> Result<()> {
        self.update_request(|r| r.match_case = match_case)
    }

    // pairs with the read lock `begin_run` holds while claiming
    fn update_request(&self, f: impl FnOnce(&mut CmdRequest)) -> Result<()> {
        let mut request = self.request.write();
        if self.is_running() {
            return Err(Error::AlreadyRunning(request.name.clone()));
        }
        f(&mut request);
        Ok(())
    }

    /// Claim the descriptor for a new run
    pub(crate) fn begin_run(&self) -> Result<Uuid> {
        let request = self.request.read();
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyRunning(request.name.clone()));
        }
        drop(request);

        let run_id = Uuid::new_v4();
        let mut outcome = self.outcome.lock();
        outcome.status = CmdStatus::Running;
        outcome.run_id = Some(run_id);
        outcome.started_at = Some(Utc::now());
        outcome.finished_at = None;
        outcome.exit_code = None;
        Ok(run_id)
    }

    pub(crate) fn record_exit_code(&self, code: Option<i32>) {
        self.outcome.lock().exit_code = code;
    }

    /// Set the terminal status and release the descriptor
    pub(crate) fn finish(&self, status: CmdStatus, update: ResultUpdate) {
        debug_assert!(status.is_terminal());
        {
            let mut outcome = self.outcome.lock();
            match update {
                ResultUpdate::Keep => {}
                ResultUpdate::Append(text) => outcome.result.push_str(&text),
                ResultUpdate::Replace(text) => outcome.result = text,
            }
            outcome.status = status;
            outcome.finished_at = Some(Utc::now());
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Builder for [`Cmd`]
#[derive(Debug)]
pub struct CmdBuilder {
    id: CmdId,
    name: Option<String>,
    db_path: PathBuf,
    db: Option<DbHandle>,
    tag: String,
    regexp: bool,
    match_case: bool,
}

impl CmdBuilder {
    fn new(id: CmdId) -> Self {
        Self {
            id,
            name: None,
            db_path: PathBuf::new(),
            db: None,
            tag: String::new(),
            regexp: false,
            match_case: true,
        }
    }

    /// Override the display name (defaults to [`CmdId::display_name`])
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Attach a registry handle; the database path follows the handle
    pub fn db(mut self, db: DbHandle) -> Self {
        self.db_path = db.path().to_path_buf();
        self.db = Some(db);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn regexp(mut self, regexp: bool) -> Self {
        self.regexp = regexp;
        self
    }

    pub fn match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    pub fn build(self) -> CmdHandle {
        Arc::new(Cmd {
            db_path: self.db_path,
            db: self.db,
            request: RwLock::new(CmdRequest {
                id: self.id,
                name: self
                    .name
                    .unwrap_or_else(|| self.id.display_name().to_string()),
                tag: self.tag,
                regexp: self.regexp,
                match_case: self.match_case,
            }),
            outcome: Mutex::new(CmdOutcome::default()),
            in_flight: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_is_pending_and_empty() {
        let cmd = Cmd::new(CmdId::FindDefinition, "/src", "main");
        assert_eq!(cmd.status(), CmdStatus::Pending);
        assert!(!cmd.has_result());
        assert!(!cmd.is_running());
        assert_eq!(cmd.name(), "Find Definition");
        assert_eq!(cmd.db_path(), Path::new("/src"));
        assert!(cmd.outcome().run_id.is_none());
    }

    #[test]
    fn test_begin_run_rejects_second_run() {
        let cmd = Cmd::new(CmdId::Grep, "/src", "TODO");
        let first = cmd.begin_run().unwrap();
        assert_eq!(cmd.status(), CmdStatus::Running);
        assert_eq!(cmd.outcome().run_id, Some(first));

        match cmd.begin_run() {
            Err(Error::AlreadyRunning(name)) => assert_eq!(name, "Search"),
            other => panic!("Expected AlreadyRunning, got {:?}", other),
        }

        cmd.finish(CmdStatus::Ok, ResultUpdate::Keep);
        assert!(!cmd.is_running());
        let second = cmd.begin_run().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_setters_refuse_while_running() {
        let cmd = Cmd::new(CmdId::FindDefinition, "/src", "main");
        cmd.begin_run().unwrap();
        assert!(cmd.set_id(CmdId::FindSymbol).is_err());
        assert!(cmd.set_tag("other").is_err());
        assert_eq!(cmd.id(), CmdId::FindDefinition);

        cmd.finish(CmdStatus::Ok, ResultUpdate::Keep);
        cmd.set_id(CmdId::FindSymbol).unwrap();
        cmd.set_name(CmdId::FindSymbol.display_name()).unwrap();
        assert_eq!(cmd.id(), CmdId::FindSymbol);
        assert_eq!(cmd.name(), "Find Symbol");
    }

    #[test]
    fn test_request_is_frozen_for_the_whole_run() {
        let cmd = Cmd::new(CmdId::FindDefinition, "/src", "main");
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let cmd = cmd.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let _ = cmd.set_tag(format!("tag{}", i));
                    }
                })
            })
            .collect();

        for _ in 0..5_000 {
            if cmd.begin_run().is_err() {
                continue;
            }
            let tag = cmd.tag();
            std::thread::yield_now();
            assert_eq!(cmd.tag(), tag);
            cmd.finish(CmdStatus::Ok, ResultUpdate::Keep);
        }

        stop.store(true, Ordering::Relaxed);
        for writer in writers {
            writer.join().unwrap();
        }
    }

    #[test]
    fn test_result_append_and_replace() {
        let cmd = Cmd::new(CmdId::AutoComplete, "/src", "ma");
        cmd.begin_run().unwrap();
        cmd.finish(CmdStatus::Ok, ResultUpdate::Append("main\n".into()));
        cmd.set_id(CmdId::AutoCompleteSymbol).unwrap();
        cmd.begin_run().unwrap();
        cmd.finish(CmdStatus::Ok, ResultUpdate::Append("malloc\n".into()));
        assert_eq!(cmd.result(), "main\nmalloc\n");

        cmd.begin_run().unwrap();
        cmd.finish(CmdStatus::Failed, ResultUpdate::Replace("oops".into()));
        assert_eq!(cmd.result(), "oops");
        assert_eq!(cmd.status(), CmdStatus::Failed);
        assert!(cmd.outcome().finished_at.is_some());
    }

    #[test]
    fn test_kind_properties() {
        for id in CmdId::ALL {
            assert_eq!(
                id.is_search(),
                !matches!(id, CmdId::CreateDatabase | CmdId::UpdateSingle | CmdId::Version)
            );
        }
        assert!(CmdId::UpdateSingle.takes_argument());
        assert!(!CmdId::CreateDatabase.takes_argument());
        assert!(!CmdId::Version.takes_argument());
        assert!(CmdId::AutoComplete.uses_library_path());
        assert!(!CmdId::FindSymbol.uses_library_path());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!CmdStatus::Pending.is_terminal());
        assert!(!CmdStatus::Running.is_terminal());
        for status in [
            CmdStatus::Ok,
            CmdStatus::Failed,
            CmdStatus::RunError,
            CmdStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
        }
    }
}
