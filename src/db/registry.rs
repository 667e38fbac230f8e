//! Database registry
//!
//! Maps source paths to tag databases and arbitrates access: one writer or
//! any number of readers per database.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Files making up a GNU Global database
pub const DB_FILES: [&str; 3] = ["GTAGS", "GRTAGS", "GPATH"];

/// Token for granted access to a database directory
#[derive(Clone, PartialEq, Eq)]
pub struct DbHandle {
    path: Arc<PathBuf>,
    write: bool,
}

impl DbHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle holds exclusive (write) access
    pub fn is_write(&self) -> bool {
        self.write
    }
}

impl fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DbHandle({}, {})",
            self.path.display(),
            if self.write { "write" } else { "read" }
        )
    }
}

/// Registry contract consumed by the lookup flows
pub trait DbRegistry: Send + Sync {
    /// Find the database covering `path` and try to lock it
    ///
    /// Returns `None` when no database covers the path. The flag tells
    /// whether access was granted; a handle that was not granted must not
    /// be released.
    fn acquire(&self, path: &Path, write: bool) -> Option<(DbHandle, bool)>;

    /// Give back access obtained from `acquire` or `register_new`
    fn release(&self, db: &DbHandle);

    /// Register a new database rooted at `dir`, locked for writing
    fn register_new(&self, dir: &Path) -> DbHandle;

    /// Forget the database and delete its files
    fn unregister(&self, db: &DbHandle) -> bool;

    /// Whether `dir` already holds a database
    fn exists_in(&self, dir: &Path) -> bool;
}

#[derive(Debug, Default)]
struct DbState {
    writer: bool,
    readers: usize,
}

/// In-process [`DbRegistry`]
#[derive(Debug, Default)]
pub struct DbManager {
    dbs: Mutex<HashMap<PathBuf, DbState>>,
}

impl DbManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest ancestor of `path` that holds a database
    fn locate(&self, dbs: &HashMap<PathBuf, DbState>, path: &Path) -> Option<PathBuf> {
        let start = if path.is_dir() {
            Some(path)
        } else {
            path.parent()
        };
        start?
            .ancestors()
            .find(|dir| dbs.contains_key(*dir) || has_db_files(dir))
            .map(Path::to_path_buf)
    }
}

impl DbRegistry for DbManager {
    fn acquire(&self, path: &Path, write: bool) -> Option<(DbHandle, bool)> {
        let path = absolute(path);
        let mut dbs = self.dbs.lock();
        let dir = self.locate(&dbs, &path)?;
        let state = dbs.entry(dir.clone()).or_default();

        let granted = if write {
            let free = !state.writer && state.readers == 0;
            if free {
                state.writer = true;
            }
            free
        } else {
            let free = !state.writer;
            if free {
                state.readers += 1;
            }
            free
        };

        debug!(db = %dir.display(), write, granted, "Database acquire");
        Some((
            DbHandle {
                path: Arc::new(dir),
                write,
            },
            granted,
        ))
    }

    fn release(&self, db: &DbHandle) {
        let mut dbs = self.dbs.lock();
        if let Some(state) = dbs.get_mut(db.path()) {
            if db.write {
                state.writer = false;
            } else {
                state.readers = state.readers.saturating_sub(1);
            }
        }
    }

    fn register_new(&self, dir: &Path) -> DbHandle {
        let dir = absolute(dir);
        let mut dbs = self.dbs.lock();
        let state = dbs.entry(dir.clone()).or_default();
        state.writer = true;
        DbHandle {
            path: Arc::new(dir),
            write: true,
        }
    }

    fn unregister(&self, db: &DbHandle) -> bool {
        self.dbs.lock().remove(db.path());

        let mut removed = true;
        for name in DB_FILES {
            match std::fs::remove_file(db.path().join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(db = %db.path().display(), file = name, "Failed to delete database file: {}", e);
                    removed = false;
                }
            }
        }
        removed
    }

    fn exists_in(&self, dir: &Path) -> bool {
        let dir = absolute(dir);
        self.dbs.lock().contains_key(&dir) || has_db_files(&dir)
    }
}

/// Resolve `path` against the working directory, following symlinks when
/// it exists
pub fn absolute(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            warn!(path = %path.display(), "Cannot resolve relative path: {}", e);
            path.to_path_buf()
        }
    }
}

fn has_db_files(dir: &Path) -> bool {
    dir.join(DB_FILES[0]).is_file()
}
