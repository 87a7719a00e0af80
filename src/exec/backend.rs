// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! Components talk to a `CommandRunner` instead of spawning processes
//! themselves. This keeps the snapshot, mount and archive logic testable with
//! a fake runner that records invocations and scripts their results.

use tokio_util::sync::CancellationToken;

use crate::types::BoxFuture;

use super::command::{CommandSpec, run_to_completion};
use super::supervise::{SupervisedExit, supervise_child};

/// Trait abstracting how external commands are executed.
///
/// Production code uses [`TokioCommandRunner`].
pub trait CommandRunner: Send + Sync {
    /// Run to completion and return stdout. Non-zero exit is an error.
    fn capture(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<String>>;

    /// Run to completion, discarding stdout. Non-zero exit is an error.
    fn run(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Run a long-lived child with its output forwarded to stderr, sending it
    /// an interrupt when `cancel` fires. The exit status is reported as-is;
    /// callers decide what counts as failure.
    fn supervise(
        &self,
        spec: CommandSpec,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, anyhow::Result<SupervisedExit>>;
}

/// Real runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    fn capture(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let output = run_to_completion(&spec).await?;
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }

    fn run(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let output = run_to_completion(&spec).await?;
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                tracing::debug!(program = %spec.program, "stdout: {}", line);
            }
            Ok(())
        })
    }

    fn supervise(
        &self,
        spec: CommandSpec,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, anyhow::Result<SupervisedExit>> {
        Box::pin(async move { supervise_child(&spec, cancel).await })
    }
}
