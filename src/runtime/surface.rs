//! Progress surfaces
//!
//! While a child runs, the engine hands it to a [`ProgressSurface`], which
//! blocks the worker until the child exits or the user cancels. The surface
//! decides how (and whether) progress is shown; the engine only needs the
//! cancel verdict.

use crate::core::cmd::{CmdId, CmdRequest};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Timeout handed to every surface
pub const ACTIVITY_TIMEOUT: Duration = Duration::from_millis(600);

/// Delay before a lookup's surface becomes visible
pub const LOOKUP_REVEAL_DELAY: Duration = Duration::from_millis(300);

/// Presentation parameters for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOptions {
    /// `<name> - "<detail>"`
    pub header: String,
    /// Refresh period of a visible surface
    pub timeout: Duration,
    /// How long the child must run before anything is shown
    pub reveal_delay: Duration,
}

impl ActivityOptions {
    pub fn for_request(request: &CmdRequest, db_path: &Path) -> Self {
        let detail = match request.id {
            CmdId::CreateDatabase => db_path.display().to_string(),
            CmdId::Version => String::new(),
            _ => request.tag.clone(),
        };
        let reveal_delay = if request.id.writes_database() {
            Duration::ZERO
        } else {
            LOOKUP_REVEAL_DELAY
        };

        Self {
            header: format!("{} - \"{}\"", request.name, detail),
            timeout: ACTIVITY_TIMEOUT,
            reveal_delay,
        }
    }
}

/// A surface's view of the running child
#[derive(Clone)]
pub struct ProcessWatch {
    pid: Option<u32>,
    exited: watch::Receiver<bool>,
}

impl ProcessWatch {
    pub(crate) fn new(pid: Option<u32>, exited: watch::Receiver<bool>) -> Self {
        Self { pid, exited }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Resolves once the child has exited
    pub async fn exited(&mut self) {
        // a dropped sender means the engine stopped watching the child
        let _ = self.exited.wait_for(|exited| *exited).await;
    }
}

impl fmt::Debug for ProcessWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessWatch")
            .field("pid", &self.pid)
            .field("exited", &self.has_exited())
            .finish()
    }
}

/// Progress/cancel contract of the supervisor
#[async_trait]
pub trait ProgressSurface: Send + Sync {
    /// Present the activity and wait; `true` means the user cancelled
    ///
    /// Must resolve once `process` has exited, if not cancelled earlier.
    async fn show(&self, process: ProcessWatch, options: ActivityOptions) -> bool;
}

/// Shows nothing and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSurface;

#[async_trait]
impl ProgressSurface for SilentSurface {
    async fn show(&self, mut process: ProcessWatch, _options: ActivityOptions) -> bool {
        process.exited().await;
        false
    }
}

/// Thread-safe trigger for a [`CancelSurface`]
///
/// Stays cancelled until [`reset`](Self::reset), so a cancel that lands
/// just before the surface is shown is not lost.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Waits for the child or for its [`CancelHandle`]
#[derive(Debug, Clone, Default)]
pub struct CancelSurface {
    handle: CancelHandle,
}

impl CancelSurface {
    pub fn new(handle: CancelHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &CancelHandle {
        &self.handle
    }

    /// Race exit against cancellation; natural exit wins a tie
    pub async fn wait(&self, process: &mut ProcessWatch) -> bool {
        tokio::select! {
            biased;
            _ = process.exited() => false,
            _ = self.handle.cancelled() => true,
        }
    }
}

#[async_trait]
impl ProgressSurface for CancelSurface {
    async fn show(&self, mut process: ProcessWatch, _options: ActivityOptions) -> bool {
        self.wait(&mut process).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cmd::Cmd;

    #[test]
    fn test_header_and_delays() {
        let create = Cmd::builder(CmdId::CreateDatabase)
            .db_path("/work/project")
            .build();
        let options = ActivityOptions::for_request(&create.request(), create.db_path());
        assert_eq!(options.header, "Create Database - \"/work/project\"");
        assert_eq!(options.reveal_delay, Duration::ZERO);
        assert_eq!(options.timeout, ACTIVITY_TIMEOUT);

        let update = Cmd::builder(CmdId::UpdateSingle).tag("/p/a.c").build();
        let options = ActivityOptions::for_request(&update.request(), update.db_path());
        assert_eq!(options.header, "Database Single File Update - \"/p/a.c\"");
        assert_eq!(options.reveal_delay, Duration::ZERO);

        let find = Cmd::builder(CmdId::FindDefinition).tag("main").build();
        let options = ActivityOptions::for_request(&find.request(), find.db_path());
        assert_eq!(options.header, "Find Definition - \"main\"");
        assert_eq!(options.reveal_delay, LOOKUP_REVEAL_DELAY);

        let version = Cmd::builder(CmdId::Version).tag("x").build();
        let options = ActivityOptions::for_request(&version.request(), version.db_path());
        assert_eq!(options.header, "About - \"\"");
    }

    #[tokio::test]
    async fn test_silent_surface_waits_for_exit() {
        let (tx, rx) = watch::channel(false);
        let watch = ProcessWatch::new(Some(42), rx);
        assert_eq!(watch.pid(), Some(42));
        assert!(!watch.has_exited());

        let task = tokio::spawn(async move {
            SilentSurface
                .show(
                    watch,
                    ActivityOptions {
                        header: String::new(),
                        timeout: ACTIVITY_TIMEOUT,
                        reveal_delay: Duration::ZERO,
                    },
                )
                .await
        });
        tx.send_replace(true);
        assert!(!task.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_surface_reports_cancel() {
        let (_tx, rx) = watch::channel(false);
        let surface = CancelSurface::default();
        surface.handle().cancel();
        assert!(surface.handle().is_cancelled());

        let mut watch = ProcessWatch::new(None, rx);
        assert!(surface.wait(&mut watch).await);

        surface.handle().reset();
        assert!(!surface.handle().is_cancelled());
    }

    #[tokio::test]
    async fn test_exit_wins_over_pending_cancel() {
        let (tx, rx) = watch::channel(false);
        tx.send_replace(true);
        let surface = CancelSurface::default();
        surface.handle().cancel();

        let mut watch = ProcessWatch::new(None, rx);
        assert!(!surface.wait(&mut watch).await);
    }
}
