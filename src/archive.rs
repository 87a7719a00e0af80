// src/archive.rs

//! Invocation of the archiving tool.
//!
//! The archive child is the only long-running process of a run and the only
//! place cancellation reaches. An interrupt we sent ourselves is an expected
//! way for the child to end, not a failure.

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{BackupError, Result};
use crate::exec::{CommandEnv, CommandRunner, CommandSpec};

/// How the archive step concluded without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Completed,
    /// Cancellation was requested and the child was interrupted.
    Interrupted,
    /// Dry run: the command line was printed, nothing was started.
    DryRun,
}

/// `create <extra...> ::<name> <mountpoints...>` for the given program.
pub fn archive_command(
    program: &str,
    env: &CommandEnv,
    name: &str,
    mountpoints: &[String],
    extra_args: &[String],
) -> CommandSpec {
    CommandSpec::new(program, env.clone())
        .arg("create")
        .args(extra_args.iter().cloned())
        .arg(format!("::{name}"))
        .args(mountpoints.iter().cloned())
}

pub struct ArchiveInvoker<R> {
    runner: R,
    program: String,
    /// Full environment; the archiver is the one child allowed the secrets.
    env: CommandEnv,
    dry_run: bool,
}

impl<R: CommandRunner> ArchiveInvoker<R> {
    pub fn new(runner: R, program: impl Into<String>, env: CommandEnv, dry_run: bool) -> Self {
        Self {
            runner,
            program: program.into(),
            env,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Archive `mountpoints` into an archive called `name`.
    pub async fn invoke(
        &self,
        name: &str,
        mountpoints: &[String],
        extra_args: &[String],
        cancel: CancellationToken,
    ) -> Result<ArchiveOutcome> {
        let spec = archive_command(&self.program, &self.env, name, mountpoints, extra_args);

        if self.dry_run {
            // The command line is the product of a dry run; it goes to stdout.
            println!("{spec}");
            info!(cmd = %spec, "dry run; archive tool not started");
            return Ok(ArchiveOutcome::DryRun);
        }

        info!(archive = %name, "running archive tool");
        let exit = self
            .runner
            .supervise(spec, cancel)
            .await
            .map_err(|cause| BackupError::ArchiveFailure { cause })?;

        if exit.interrupted {
            info!(archive = %name, exit_code = ?exit.code, "archive tool interrupted on request");
            return Ok(ArchiveOutcome::Interrupted);
        }
        if !exit.success {
            let status = match exit.code {
                Some(code) => format!("exit code {code}"),
                None => "a signal".to_string(),
            };
            return Err(BackupError::ArchiveFailure {
                cause: anyhow!("`{}` terminated with {status}", self.program),
            });
        }
        Ok(ArchiveOutcome::Completed)
    }
}
