// src/snapshot/provisioner.rs

use anyhow::anyhow;
use tracing::{debug, info};

use crate::config::ToolsSection;
use crate::errors::{BackupError, Result};
use crate::exec::{CommandEnv, CommandRunner, CommandSpec};
use crate::types::BoxFuture;

/// Timestamp format used for new snapshot labels and for the archive label of
/// live sources. Matches the label part of system snapshot names.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Creates, discovers and destroys snapshots of one source at a time.
///
/// Calls for distinct sources may run concurrently.
pub trait SnapshotProvisioner: Send + Sync {
    /// Create a new snapshot of `source` and return the name it was created
    /// under. Never retried.
    fn create<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Handle of the newest existing snapshot of `source`.
    fn latest<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Remove `snapshot` from `source`.
    fn destroy<'a>(&'a self, snapshot: &'a str, source: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// External programs used by [`ApfsSnapshots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTools {
    /// Creates (`-c <label> <source>`) and deletes (`-d <name> <source>`).
    pub util: String,
    /// Lists snapshots (`listlocalsnapshots <source>`), oldest first.
    pub lister: String,
}

impl From<&ToolsSection> for SnapshotTools {
    fn from(tools: &ToolsSection) -> Self {
        Self {
            util: tools.snapshot_util.clone(),
            lister: tools.snapshot_lister.clone(),
        }
    }
}

/// APFS snapshots driven through the snapshot utility and `tmutil`.
///
/// Every child runs with the sanitized environment it was built with.
pub struct ApfsSnapshots<R> {
    runner: R,
    tools: SnapshotTools,
    env: CommandEnv,
}

impl<R: CommandRunner> ApfsSnapshots<R> {
    /// `env` is sanitized here, so callers may pass the full environment.
    pub fn new(runner: R, tools: SnapshotTools, env: &CommandEnv) -> Self {
        Self {
            runner,
            tools,
            env: env.sanitized(),
        }
    }

    fn util(&self) -> CommandSpec {
        CommandSpec::new(&self.tools.util, self.env.clone())
    }
}

impl<R: CommandRunner> SnapshotProvisioner for ApfsSnapshots<R> {
    fn create<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let label = chrono::Local::now()
                .format(SNAPSHOT_TIMESTAMP_FORMAT)
                .to_string();
            info!(source = %source, label = %label, "creating snapshot");

            let spec = self.util().arg("-c").arg(&label).arg(source);
            self.runner
                .run(spec)
                .await
                .map_err(|cause| BackupError::ProvisionFailure {
                    source_path: source.to_string(),
                    cause,
                })?;
            Ok(label)
        })
    }

    fn latest<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let spec = CommandSpec::new(&self.tools.lister, self.env.clone())
                .arg("listlocalsnapshots")
                .arg(source);
            let stdout = self
                .runner
                .capture(spec)
                .await
                .map_err(|cause| BackupError::DiscoveryFailure {
                    source_path: source.to_string(),
                    cause,
                })?;

            let latest = last_snapshot_line(&stdout).ok_or_else(|| {
                BackupError::NoSnapshotsAvailable {
                    source_path: source.to_string(),
                }
            })?;
            debug!(source = %source, snapshot = %latest, "found latest snapshot");
            Ok(latest.to_string())
        })
    }

    fn destroy<'a>(&'a self, snapshot: &'a str, source: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if snapshot.is_empty() {
                return Err(BackupError::DestroyFailure {
                    snapshot: String::new(),
                    source_path: source.to_string(),
                    cause: anyhow!("empty snapshot handle"),
                });
            }

            let spec = self.util().arg("-d").arg(snapshot).arg(source);
            self.runner
                .run(spec)
                .await
                .map_err(|cause| BackupError::DestroyFailure {
                    snapshot: snapshot.to_string(),
                    source_path: source.to_string(),
                    cause,
                })
        })
    }
}

/// Last non-blank line of the lister output (the newest snapshot).
///
/// `tmutil` prints a header line (`Snapshots for disk /:`) before the names on
/// newer systems; it is skipped.
fn last_snapshot_line(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .last()
}
