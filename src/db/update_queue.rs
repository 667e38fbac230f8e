use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Files waiting for a single-file database update
///
/// Updates that find their database busy are parked here and picked up by
/// whichever run releases that database next.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    files: Mutex<VecDeque<PathBuf>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `file` unless it is already waiting; returns whether it was added
    pub fn enqueue_if_absent(&self, file: impl Into<PathBuf>) -> bool {
        let file = file.into();
        let mut files = self.files.lock();
        if files.iter().rev().any(|f| *f == file) {
            return false;
        }
        files.push_back(file);
        true
    }

    /// Remove and return the oldest queued file under `db_dir`
    pub fn take_matching(&self, db_dir: &Path) -> Option<PathBuf> {
        let mut files = self.files.lock();
        let idx = files.iter().position(|f| f.starts_with(db_dir))?;
        files.remove(idx)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}
