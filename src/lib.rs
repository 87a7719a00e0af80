// src/lib.rs

pub mod archive;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod mount;
pub mod snapshot;
pub mod types;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::{ArchiveInvoker, ArchiveOutcome};
use crate::cli::CliArgs;
use crate::config::{BackupConfig, RawBackupConfig, load_from_path};
use crate::engine::{Orchestrator, RunSummary};
use crate::errors::{BackupError, Result};
use crate::exec::{CommandEnv, SECRET_VARS, TokioCommandRunner};
use crate::mount::SystemMounter;
use crate::snapshot::{ApfsSnapshots, SnapshotTools};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + flags) and validation
/// - preflight checks (archive credentials, root)
/// - the real runner, snapshot provisioner, mounter and archiver
/// - SIGINT / SIGTERM → cancellation of the archive step
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let base = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawBackupConfig::default(),
    };
    let config = BackupConfig::try_from(args.apply_to(base))?;

    let env = CommandEnv::from_process();
    require_archive_env(&env)?;
    require_root()?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let runner = TokioCommandRunner;
    let tools = config.tools().clone();
    let snapshots = ApfsSnapshots::new(runner, SnapshotTools::from(&tools), &env);
    let mounter = SystemMounter::new(runner, tools.mount.clone(), &env);
    let archiver = ArchiveInvoker::new(runner, tools.archiver.clone(), env, config.dry_run());

    let mut orchestrator = Orchestrator::new(config, snapshots, mounter, archiver);
    let summary = orchestrator.run(cancel).await?;

    match summary.archive {
        ArchiveOutcome::Completed => info!(archive = %summary.archive_name, "backup finished"),
        ArchiveOutcome::Interrupted => {
            warn!(archive = %summary.archive_name, "backup interrupted; cleanup completed")
        }
        ArchiveOutcome::DryRun => info!(archive = %summary.archive_name, "dry run finished"),
    }
    Ok(summary)
}

/// The archive tool reads its repository and passphrase from the environment.
pub fn require_archive_env(env: &CommandEnv) -> Result<()> {
    for key in SECRET_VARS {
        if env.get(key).is_none_or(str::is_empty) {
            return Err(BackupError::Preflight(format!("{key} not specified")));
        }
    }
    Ok(())
}

fn require_root() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        return Err(BackupError::Preflight(
            "requires root privileges".to_string(),
        ));
    }
    Ok(())
}

/// Translate the first SIGINT / SIGTERM into cancellation.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        info!("termination requested; interrupting archive step");
        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_env_requires_both_secrets() {
        let env = CommandEnv::from_pairs([("BORG_REPO", "/repo")]);
        let err = require_archive_env(&env).unwrap_err();
        assert!(err.to_string().contains("BORG_PASSPHRASE"));

        let env = env.with_var("BORG_PASSPHRASE", "");
        assert!(require_archive_env(&env).is_err());

        let env = env.with_var("BORG_PASSPHRASE", "secret");
        assert!(require_archive_env(&env).is_ok());
    }
}
