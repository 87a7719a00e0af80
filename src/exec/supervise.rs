// src/exec/supervise.rs

//! Supervision of a long-running child that may be interrupted.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::CommandSpec;

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisedExit {
    /// Exit code, `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    /// Set once cancellation was observed and the child was sent `SIGINT`.
    pub interrupted: bool,
}

/// Start `spec` with both output streams forwarded to our stderr, and wait
/// for it to exit.
///
/// If `cancel` fires first, the child receives `SIGINT` and is then awaited
/// normally so it can shut down cleanly.
pub(crate) async fn supervise_child(
    spec: &CommandSpec,
    cancel: CancellationToken,
) -> Result<SupervisedExit> {
    info!(cmd = %spec, "starting supervised process");

    let mut child = spec
        .to_command()
        .stdout(std::io::stderr())
        .stderr(std::io::stderr())
        .spawn()
        .with_context(|| format!("spawning process `{}`", spec.program))?;

    let pid = child.id();
    let mut interrupted = false;

    let status = tokio::select! {
        status = child.wait() => {
            status.with_context(|| format!("waiting for process `{}`", spec.program))?
        }
        _ = cancel.cancelled() => {
            interrupted = true;
            info!(program = %spec.program, ?pid, "cancellation requested; interrupting process");
            match pid {
                Some(raw) => {
                    if let Err(e) = kill(Pid::from_raw(raw as i32), Signal::SIGINT) {
                        warn!(program = %spec.program, error = %e, "failed to signal child process");
                    }
                }
                None => debug!(program = %spec.program, "process already reaped before interrupt"),
            }
            child
                .wait()
                .await
                .with_context(|| format!("waiting for interrupted process `{}`", spec.program))?
        }
    };

    info!(
        program = %spec.program,
        exit_code = ?status.code(),
        success = status.success(),
        interrupted,
        "supervised process exited"
    );

    Ok(SupervisedExit {
        code: status.code(),
        success: status.success(),
        interrupted,
    })
}
