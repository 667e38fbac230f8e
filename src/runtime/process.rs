//! Child-process launch, stream drains and supervision
//!
//! Both pipes are drained by their own task so a child that fills one
//! stream cannot stall waiting for the other to be read.

use crate::core::cmd::{CmdId, CmdRequest, CmdStatus, ResultUpdate};
use crate::core::config::Config;
use crate::core::invocation::Invocation;
use crate::runtime::surface::{ActivityOptions, ProcessWatch, ProgressSurface};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Environment variable pointing `global` at library databases
pub const LIBRARY_PATH_VAR: &str = "GTAGSLIBPATH";

/// Where and with what environment the child starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchOptions {
    pub fn for_request(request: &CmdRequest, db_path: &Path, config: &Config) -> Self {
        let current_dir = match request.id {
            CmdId::Version => None,
            _ => Some(db_path.to_path_buf()),
        };
        let env = if request.id.uses_library_path() {
            vec![(LIBRARY_PATH_VAR.to_string(), config.library_env().to_string())]
        } else {
            Vec::new()
        };

        Self { current_dir, env }
    }
}

/// What happened to the child
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The child could not be created or its pipes were missing
    LaunchFailed(io::Error),
    /// A pipe could not be read to the end
    DrainFailed(io::Error),
    /// The surface reported a user cancel; the child was killed
    Cancelled,
    Finished {
        exit_code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
}

/// Launch `invocation`, drain its output and supervise it until it ends
pub async fn run_process(
    invocation: &Invocation,
    launch: &LaunchOptions,
    surface: &dyn ProgressSurface,
    options: ActivityOptions,
) -> ProcessOutcome {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &launch.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &launch.env {
        command.env(key, value);
    }

    // terminal signals stay with the front end; only a cancel ends the child
    #[cfg(unix)]
    command.process_group(0);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return ProcessOutcome::LaunchFailed(e),
    };

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        _ => {
            reap(&mut child).await;
            return ProcessOutcome::LaunchFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "child output pipes are not available",
            ));
        }
    };
    debug!(pid = ?child.id(), "Child started");

    let stdout_task = tokio::spawn(drain(stdout));
    let stderr_task = tokio::spawn(drain(stderr));

    let (exit_tx, exit_rx) = watch::channel(false);
    let show = surface.show(ProcessWatch::new(child.id(), exit_rx), options);
    tokio::pin!(show);

    let mut exit_code = None;
    let mut exited = false;
    let cancelled = loop {
        tokio::select! {
            cancelled = &mut show => break cancelled,
            status = child.wait(), if !exited => {
                exited = true;
                match status {
                    Ok(status) => exit_code = status.code(),
                    Err(e) => warn!("Failed to wait for child: {}", e),
                }
                exit_tx.send_replace(true);
            }
        }
    };

    reap(&mut child).await;

    if cancelled {
        stdout_task.abort();
        stderr_task.abort();
        return ProcessOutcome::Cancelled;
    }

    let stdout = match join_drain(stdout_task).await {
        Ok(bytes) => bytes,
        Err(e) => return ProcessOutcome::DrainFailed(e),
    };
    let stderr = match join_drain(stderr_task).await {
        Ok(bytes) => bytes,
        Err(e) => return ProcessOutcome::DrainFailed(e),
    };

    ProcessOutcome::Finished {
        exit_code,
        stdout,
        stderr,
    }
}

async fn drain<R>(mut stream: R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

async fn join_drain(task: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    task.await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Terminate the child if it is still active and release it
async fn reap(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            warn!(pid = ?child.id(), "Terminating child process");
            if let Err(e) = child.start_kill() {
                warn!("Failed to terminate child: {}", e);
            }
            if let Err(e) = child.wait().await {
                warn!("Failed to reap child: {}", e);
            }
        }
    }
}

/// Turn drained output into the run's status and result change
///
/// Standard output wins and is appended to the existing result. Error
/// output alone replaces the result and means failure, except for database
/// creation where `gtags` diagnostics are reported without failing the run.
pub(crate) fn classify(id: CmdId, stdout: &[u8], stderr: &[u8]) -> (CmdStatus, ResultUpdate) {
    if !stdout.is_empty() {
        return (
            CmdStatus::Ok,
            ResultUpdate::Append(String::from_utf8_lossy(stdout).into_owned()),
        );
    }

    if !stderr.is_empty() {
        let text = String::from_utf8_lossy(stderr).into_owned();
        let status = if id == CmdId::CreateDatabase {
            CmdStatus::Ok
        } else {
            CmdStatus::Failed
        };
        return (status, ResultUpdate::Replace(text));
    }

    (CmdStatus::Ok, ResultUpdate::Keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cmd::Cmd;

    #[test]
    fn test_stdout_is_ok_and_appended() {
        let (status, update) = classify(CmdId::FindDefinition, b"a.c:10:foo();", b"");
        assert_eq!(status, CmdStatus::Ok);
        assert_eq!(update, ResultUpdate::Append("a.c:10:foo();".into()));

        // stdout wins even with diagnostics on stderr
        let (status, update) = classify(CmdId::Grep, b"x.c:1:y", b"warning");
        assert_eq!(status, CmdStatus::Ok);
        assert_eq!(update, ResultUpdate::Append("x.c:1:y".into()));
    }

    #[test]
    fn test_stderr_fails_lookups() {
        let (status, update) = classify(CmdId::FindDefinition, b"", b"global: GTAGS not found.");
        assert_eq!(status, CmdStatus::Failed);
        assert_eq!(update, ResultUpdate::Replace("global: GTAGS not found.".into()));
    }

    #[test]
    fn test_stderr_tolerated_for_create_database() {
        let (status, update) = classify(CmdId::CreateDatabase, b"", b"global: GTAGS not found.");
        assert_eq!(status, CmdStatus::Ok);
        assert_eq!(update, ResultUpdate::Replace("global: GTAGS not found.".into()));

        let (status, _) = classify(CmdId::UpdateSingle, b"", b"gtags: cannot open");
        assert_eq!(status, CmdStatus::Failed);
    }

    #[test]
    fn test_empty_output_is_ok_for_every_kind() {
        for id in CmdId::ALL {
            assert_eq!(classify(id, b"", b""), (CmdStatus::Ok, ResultUpdate::Keep), "{}", id);
        }
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let (_, update) = classify(CmdId::Grep, &[b'a', 0xFF, b'b'], b"");
        assert_eq!(update, ResultUpdate::Append("a\u{FFFD}b".into()));
    }

    #[test]
    fn test_launch_options() {
        let config = Config {
            use_library: true,
            library_path: "/usr/include".into(),
            ..Config::default()
        };

        let def = Cmd::builder(CmdId::FindDefinition).db_path("/p").build();
        let launch = LaunchOptions::for_request(&def.request(), def.db_path(), &config);
        assert_eq!(launch.current_dir, Some(PathBuf::from("/p")));
        assert_eq!(
            launch.env,
            vec![(LIBRARY_PATH_VAR.to_string(), "/usr/include".to_string())]
        );

        let complete = Cmd::builder(CmdId::AutoComplete).db_path("/p").build();
        let launch = LaunchOptions::for_request(&complete.request(), complete.db_path(), &Config::default());
        assert_eq!(launch.env, vec![(LIBRARY_PATH_VAR.to_string(), String::new())]);

        let refs = Cmd::builder(CmdId::FindReference).db_path("/p").build();
        let launch = LaunchOptions::for_request(&refs.request(), refs.db_path(), &config);
        assert!(launch.env.is_empty());

        let version = Cmd::builder(CmdId::Version).db_path("/p").build();
        let launch = LaunchOptions::for_request(&version.request(), version.db_path(), &config);
        assert_eq!(launch.current_dir, None);
    }
}
