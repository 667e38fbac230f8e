//! Execution engine
//!
//! Every run gets a fresh, named OS thread that owns a current-thread tokio
//! runtime for the child process and its two drains. The thread finalizes
//! the descriptor, fires the completion callback (if any) and exits.

use crate::core::cmd::{CmdHandle, CmdStatus, ResultUpdate};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::invocation::Invocation;
use crate::runtime::process::{self, LaunchOptions, ProcessOutcome};
use crate::runtime::pump::{EventPump, NoPump, PumpStatus};
use crate::runtime::surface::{ActivityOptions, ProgressSurface, SilentSurface};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Called on the worker thread once a run has finished
pub type CompletionCallback = Box<dyn FnOnce(CmdHandle) + Send + 'static>;

/// How often a synchronous caller services its own events
pub const PUMP_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `gtags`/`global` for command descriptors
///
/// Cheap to clone; clones share configuration and surface.
#[derive(Clone)]
pub struct CmdEngine {
    config: Arc<RwLock<Config>>,
    surface: Arc<dyn ProgressSurface>,
}

impl fmt::Debug for CmdEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmdEngine")
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

impl CmdEngine {
    /// Engine with the [`SilentSurface`]
    pub fn new(config: Config) -> Self {
        Self::with_surface(config, Arc::new(SilentSurface))
    }

    pub fn with_surface(config: Config, surface: Arc<dyn ProgressSurface>) -> Self {
        Self::from_shared(Arc::new(RwLock::new(config)), surface)
    }

    /// Engine reading settings that the caller may change between runs
    pub fn from_shared(config: Arc<RwLock<Config>>, surface: Arc<dyn ProgressSurface>) -> Self {
        Self { config, surface }
    }

    /// Snapshot of the current settings
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Replace the settings; applies from the next run on
    pub fn set_config(&self, config: Config) {
        *self.config.write() = config;
    }

    pub fn shared_config(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Start a run, asynchronously with a callback or blocking without one
    ///
    /// With a callback, returns as soon as the worker is spawned; `false`
    /// means it could not be and the callback will not fire. Without one,
    /// blocks until the run finishes and returns whether it ended `Ok`.
    pub fn run(&self, cmd: &CmdHandle, on_complete: Option<CompletionCallback>) -> bool {
        match on_complete {
            Some(on_complete) => match self.start(cmd, on_complete) {
                Ok(_handle) => true,
                Err(e) => {
                    warn!("Failed to start {}: {}", cmd.id(), e);
                    false
                }
            },
            None => self.run_blocking(cmd, &mut NoPump),
        }
    }

    /// Start an asynchronous run
    ///
    /// Dropping the returned handle detaches the worker; the callback still
    /// fires when the run completes.
    pub fn start(&self, cmd: &CmdHandle, on_complete: CompletionCallback) -> Result<RunHandle> {
        self.spawn_worker(cmd, Some(on_complete))
    }

    /// Run and wait, servicing `pump` while the worker is busy
    ///
    /// Returns `true` iff the run finished `Ok`. If the pump reports a host
    /// shutdown the wait ends early and the run continues detached.
    pub fn run_blocking(&self, cmd: &CmdHandle, pump: &mut dyn EventPump) -> bool {
        let handle = match self.spawn_worker(cmd, None) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to start {}: {}", cmd.id(), e);
                return false;
            }
        };

        while !handle.wait_timeout(PUMP_INTERVAL) {
            if pump.pump() == PumpStatus::Quit {
                info!(run_id = %handle.run_id(), "Host is quitting, no longer waiting for run");
                return false;
            }
        }

        handle.join() == CmdStatus::Ok
    }

    fn spawn_worker(
        &self,
        cmd: &CmdHandle,
        on_complete: Option<CompletionCallback>,
    ) -> Result<RunHandle> {
        let run_id = cmd.begin_run()?;
        let done = Arc::new(Completion::default());

        let worker = Worker {
            cmd: Arc::clone(cmd),
            config: Arc::clone(&self.config),
            surface: Arc::clone(&self.surface),
            run_id,
            done: Arc::clone(&done),
            on_complete,
        };

        let spawned = thread::Builder::new()
            .name(format!("gtags-run-{}", cmd.id()))
            .spawn(move || worker.run());

        match spawned {
            Ok(join) => Ok(RunHandle {
                join: Some(join),
                done,
                cmd: Arc::clone(cmd),
                run_id,
            }),
            Err(e) => {
                error!("Failed to spawn worker thread: {}", e);
                cmd.finish(CmdStatus::RunError, ResultUpdate::Keep);
                Err(Error::WorkerSpawn(e))
            }
        }
    }
}

/// Caller-side handle to one run's worker
///
/// Dropping it detaches the worker.
pub struct RunHandle {
    join: Option<JoinHandle<()>>,
    done: Arc<Completion>,
    cmd: CmdHandle,
    run_id: Uuid,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cmd(&self) -> &CmdHandle {
        &self.cmd
    }

    /// Whether the run has finished, callback included
    pub fn is_finished(&self) -> bool {
        self.done.is_done()
    }

    /// Wait up to `timeout` for the run to finish
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    /// Wait for the worker thread to exit and return the final status
    pub fn join(mut self) -> CmdStatus {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(run_id = %self.run_id, "Worker thread panicked");
            }
        }
        self.cmd.status()
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// One-shot completion signal shared by a worker and its handle
#[derive(Default)]
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn complete(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn is_done(&self) -> bool {
        *self.done.lock()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if !*done {
            self.cond.wait_for(&mut done, timeout);
        }
        *done
    }
}

/// Signals completion even if the callback panics
struct CompleteOnDrop(Arc<Completion>);

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        self.0.complete();
    }
}

struct Worker {
    cmd: CmdHandle,
    config: Arc<RwLock<Config>>,
    surface: Arc<dyn ProgressSurface>,
    run_id: Uuid,
    done: Arc<Completion>,
    on_complete: Option<CompletionCallback>,
}

impl Worker {
    fn run(self) {
        let Worker {
            cmd,
            config,
            surface,
            run_id,
            done,
            on_complete,
        } = self;
        let _complete = CompleteOnDrop(done);

        let span = info_span!("run", %run_id, kind = %cmd.id());
        let _enter = span.enter();

        let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
            execute(&cmd, &config, surface.as_ref())
        }));
        let (status, update) = verdict.unwrap_or_else(|_| {
            error!("Run panicked");
            (CmdStatus::RunError, ResultUpdate::Keep)
        });

        cmd.finish(status, update);
        info!(%status, "Run finished");

        if let Some(on_complete) = on_complete {
            on_complete(cmd);
        }
    }
}

fn execute(
    cmd: &CmdHandle,
    config: &RwLock<Config>,
    surface: &dyn ProgressSurface,
) -> (CmdStatus, ResultUpdate) {
    let request = cmd.request();
    let config = config.read().clone();
    let tools_dir = config.tools_dir_or_default();

    let invocation = Invocation::compose(&request, &tools_dir, &config);
    let launch = LaunchOptions::for_request(&request, cmd.db_path(), &config);
    let options = ActivityOptions::for_request(&request, cmd.db_path());
    info!(name = %request.name, tag = %request.tag, "Run started");
    debug!(command_line = %invocation, cwd = ?launch.current_dir, "Launching");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!("Failed to build worker runtime: {}", e);
            return (CmdStatus::RunError, ResultUpdate::Keep);
        }
    };

    let outcome = runtime.block_on(process::run_process(&invocation, &launch, surface, options));

    match outcome {
        ProcessOutcome::LaunchFailed(e) => {
            warn!(program = %invocation.program.display(), "Failed to launch: {}", e);
            (CmdStatus::RunError, ResultUpdate::Keep)
        }
        ProcessOutcome::DrainFailed(e) => {
            warn!("Failed to capture output: {}", e);
            (CmdStatus::RunError, ResultUpdate::Keep)
        }
        ProcessOutcome::Cancelled => {
            info!("Run cancelled by user");
            (CmdStatus::Cancelled, ResultUpdate::Keep)
        }
        ProcessOutcome::Finished {
            exit_code,
            stdout,
            stderr,
        } => {
            debug!(
                ?exit_code,
                stdout_len = stdout.len(),
                stderr_len = stderr.len(),
                "Child finished"
            );
            cmd.record_exit_code(exit_code);
            process::classify(request.id, &stdout, &stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cmd::{Cmd, CmdId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn missing_tools_engine() -> CmdEngine {
        CmdEngine::new(Config {
            tools_dir: Some("/nonexistent/gtags/bin".into()),
            ..Config::default()
        })
    }

    #[test]
    fn test_launch_failure_is_run_error() {
        let engine = missing_tools_engine();
        let cmd = Cmd::new(CmdId::FindDefinition, std::env::temp_dir(), "main");
        assert!(!engine.run(&cmd, None));
        assert_eq!(cmd.status(), CmdStatus::RunError);
        assert!(!cmd.has_result());
        assert!(cmd.outcome().exit_code.is_none());
        assert!(!cmd.is_running());
    }

    #[test]
    fn test_callback_fires_once_with_descriptor() {
        let engine = missing_tools_engine();
        let cmd = Cmd::new(CmdId::Grep, std::env::temp_dir(), "TODO");
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&calls);
        let expected = Arc::clone(&cmd);
        let handle = engine
            .start(
                &cmd,
                Box::new(move |done| {
                    assert!(Arc::ptr_eq(&done, &expected));
                    assert!(!done.is_running());
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(handle.join(), CmdStatus::RunError);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_busy_descriptor_is_rejected() {
        let engine = missing_tools_engine();
        let cmd = Cmd::new(CmdId::Grep, std::env::temp_dir(), "TODO");
        cmd.begin_run().unwrap();

        match engine.start(&cmd, Box::new(|_| panic!("must not fire"))) {
            Err(Error::AlreadyRunning(_)) => {}
            other => panic!("Expected AlreadyRunning, got {:?}", other),
        }
        assert!(!engine.run(&cmd, None));
        assert_eq!(cmd.status(), CmdStatus::Running);
    }

    #[test]
    fn test_config_changes_apply_to_engine_clones() {
        let engine = CmdEngine::new(Config::default());
        let clone = engine.clone();
        let mut config = engine.config();
        config.use_library = true;
        engine.set_config(config);
        assert!(clone.config().use_library);
    }
}
