// src/engine/orchestrator.rs

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveInvoker, ArchiveOutcome};
use crate::config::BackupConfig;
use crate::errors::{BackupError, Result};
use crate::exec::CommandRunner;
use crate::lock::LockGuard;
use crate::mount::Mounter;
use crate::snapshot::SnapshotProvisioner;
use crate::snapshot::provisioner::SNAPSHOT_TIMESTAMP_FORMAT;
use crate::types::ResolvedSnapshot;

use super::Phase;
use super::naming::derive_archive_name;
use super::state::RunState;
use super::teardown::{Teardown, TeardownReport};

/// Result of a run that reached the end of the primary path without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub archive_name: String,
    /// Index-aligned with the configured sources.
    pub snapshots: Vec<ResolvedSnapshot>,
    pub archive: ArchiveOutcome,
}

/// Drives one backup run across all configured sources.
///
/// Lock, provision (in parallel), mount (in order), archive, then tear down
/// whatever was acquired, whether or not the earlier phases succeeded.
pub struct Orchestrator<P, M, R> {
    config: BackupConfig,
    snapshots: Arc<P>,
    mounter: M,
    archiver: ArchiveInvoker<R>,
    hostname: Option<String>,
    state: RunState,
}

impl<P, M, R> fmt::Debug for Orchestrator<P, M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<P, M, R> Orchestrator<P, M, R>
where
    P: SnapshotProvisioner + 'static,
    M: Mounter,
    R: CommandRunner,
{
    pub fn new(config: BackupConfig, snapshots: P, mounter: M, archiver: ArchiveInvoker<R>) -> Self {
        Self {
            config,
            snapshots: Arc::new(snapshots),
            mounter,
            archiver,
            hostname: None,
            state: RunState::new(),
        }
    }

    /// Use a fixed hostname for archive naming instead of asking the system.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Execute the run.
    ///
    /// The returned error is the first failure of the primary path (lock,
    /// provision, mount, archive); teardown failures are attached to it as
    /// context, or become the error themselves when the primary path
    /// succeeded. Cancelling `cancel` interrupts only the archive step.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary> {
        self.state.advance(Phase::Locking);
        let lock = match LockGuard::acquire(self.config.lock_file()) {
            Ok(lock) => lock,
            Err(err) => {
                error!(error = %err, "could not acquire lock; nothing was touched");
                self.state.advance(Phase::Aborted);
                return Err(err);
            }
        };
        info!(lock = %lock.path().display(), "lock acquired");

        let mut teardown = Teardown::new();
        let primary = self.run_primary(&mut teardown, &cancel).await;
        if let Err(err) = &primary {
            error!(error = %err, "backup failed; cleaning up");
        }

        let report = teardown
            .execute(&self.mounter, self.snapshots.as_ref(), &mut self.state)
            .await;
        let outcome = self.conclude(primary, report);

        // The lock outlives teardown.
        drop(lock);
        outcome
    }

    fn conclude(&mut self, primary: Result<RunSummary>, report: TeardownReport) -> Result<RunSummary> {
        debug!(
            unmounted = report.unmounted,
            destroyed = report.destroyed,
            failures = report.errors.len(),
            halted = report.halted,
            "teardown finished"
        );

        let outcome = match primary {
            Ok(summary) => match BackupError::from_cleanup(report.errors) {
                None => Ok(summary),
                Some(err) => Err(err),
            },
            Err(err) => Err(BackupError::with_cleanup(err, report.errors)),
        };

        if outcome.is_ok() {
            self.state.advance(Phase::Done);
        } else {
            self.state.advance(Phase::Aborted);
        }
        outcome
    }

    async fn run_primary(
        &mut self,
        teardown: &mut Teardown,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let owned = if self.config.use_existing_snapshots() {
            debug!("using existing snapshots; skipping provisioning");
            vec![None; self.config.len()]
        } else {
            self.state.advance(Phase::Provisioning);
            self.provision_all(teardown).await?
        };

        self.state.advance(Phase::Mounting);
        let resolved = self.mount_all(&owned, teardown).await?;

        let archive_name = match self.config.archive_name() {
            Some(name) => name.to_string(),
            None => {
                let hostname = self.hostname()?;
                let now = chrono::Local::now()
                    .format(SNAPSHOT_TIMESTAMP_FORMAT)
                    .to_string();
                derive_archive_name(None, &resolved, &hostname, &now)
            }
        };

        self.state.advance(Phase::Archiving);
        let archive = self
            .archiver
            .invoke(
                &archive_name,
                self.config.mountpoints(),
                self.config.borg_args(),
                cancel.clone(),
            )
            .await?;
        if archive == ArchiveOutcome::Interrupted {
            self.state.mark_cancel_requested();
        }

        Ok(RunSummary {
            archive_name,
            snapshots: resolved,
            archive,
        })
    }

    /// Create one snapshot per source concurrently.
    ///
    /// All tasks are awaited. Every snapshot that was created is registered
    /// for destruction, even when looking up its handle failed afterwards.
    /// The first failure in source order is returned; further failures are
    /// logged.
    async fn provision_all(&self, teardown: &mut Teardown) -> Result<Vec<Option<String>>> {
        let mut tasks = JoinSet::new();
        for (index, source) in self.config.sources().iter().cloned().enumerate() {
            let snapshots = Arc::clone(&self.snapshots);
            tasks.spawn(async move {
                let provisioned = provision_one(snapshots.as_ref(), &source).await;
                (index, provisioned)
            });
        }

        let mut results: Vec<Option<Provisioned>> =
            (0..self.config.len()).map(|_| None).collect();
        let mut crashed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, provisioned)) => results[index] = Some(provisioned),
                Err(join_err) => crashed.push(BackupError::Other(anyhow!(
                    "snapshot task did not complete: {join_err}"
                ))),
            }
        }

        let mut owned = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            let source = &self.config.sources()[index];
            let Some(provisioned) = result else {
                owned.push(None);
                continue;
            };
            match provisioned.handle {
                Ok(handle) => {
                    teardown.push_destroy(index, handle.clone(), source.clone());
                    owned.push(Some(handle));
                }
                Err(err) => {
                    if let Some(created) = provisioned.created {
                        warn!(source = %source, snapshot = %created, "snapshot created but not found; removing it by name");
                        teardown.push_destroy(index, created, source.clone());
                    }
                    failures.push(err);
                    owned.push(None);
                }
            }
        }
        failures.extend(crashed);

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(owned),
            Some(first) => {
                for other in failures {
                    error!(error = %other, "additional provisioning failure");
                }
                Err(first)
            }
        }
    }

    /// Resolve and mount each source in order, registering every successful
    /// mount for teardown as soon as it exists.
    async fn mount_all(
        &self,
        owned: &[Option<String>],
        teardown: &mut Teardown,
    ) -> Result<Vec<ResolvedSnapshot>> {
        let mut resolved = Vec::with_capacity(self.config.len());

        for (index, (source, mountpoint)) in self
            .config
            .sources()
            .iter()
            .zip(self.config.mountpoints())
            .enumerate()
        {
            let should_mount = source != mountpoint;
            let snapshot = self
                .resolve_snapshot(index, owned[index].as_deref(), should_mount)
                .await?;
            debug!(index, source = %source, snapshot = %snapshot.handle, ownership = ?snapshot.ownership, "resolved snapshot");

            if should_mount {
                self.mounter
                    .mount(&snapshot.handle, source, mountpoint)
                    .await?;
                info!(source = %source, mountpoint = %mountpoint, "mounted snapshot");
                teardown.push_unmount(index, mountpoint.clone());
            } else {
                info!(source = %source, "source is its own mountpoint; archiving it live");
            }
            resolved.push(snapshot);
        }

        Ok(resolved)
    }

    /// Caller-supplied snapshot, then one created by this run, then the latest
    /// existing one (only needed when mounting), else live.
    async fn resolve_snapshot(
        &self,
        index: usize,
        owned: Option<&str>,
        should_mount: bool,
    ) -> Result<ResolvedSnapshot> {
        if let Some(supplied) = self.config.snapshot_for(index) {
            return Ok(ResolvedSnapshot::borrowed(supplied));
        }
        if let Some(handle) = owned {
            return Ok(ResolvedSnapshot::owned(handle));
        }
        if should_mount {
            let source = &self.config.sources()[index];
            let latest = self.snapshots.latest(source).await?;
            return Ok(ResolvedSnapshot::borrowed(latest));
        }
        Ok(ResolvedSnapshot::live())
    }

    fn hostname(&self) -> Result<String> {
        if let Some(hostname) = &self.hostname {
            return Ok(hostname.clone());
        }
        gethostname::gethostname()
            .into_string()
            .map_err(|raw| BackupError::Hostname(format!("not valid UTF-8: {raw:?}")))
    }
}

/// Outcome of provisioning one source.
struct Provisioned {
    /// Name passed to the snapshot tool, once `create` succeeded.
    created: Option<String>,
    /// Handle as listed by the system, used for mounting and removal.
    handle: Result<String>,
}

/// Create a snapshot of `source` and look up the handle it was given.
async fn provision_one<P>(snapshots: &P, source: &str) -> Provisioned
where
    P: SnapshotProvisioner + ?Sized,
{
    info!(source = %source, "creating snapshot for source");
    let created = match snapshots.create(source).await {
        Ok(created) => created,
        Err(err) => {
            return Provisioned {
                created: None,
                handle: Err(err),
            };
        }
    };

    let handle = snapshots.latest(source).await;
    if let Ok(handle) = &handle {
        info!(source = %source, snapshot = %handle, "created snapshot for source");
    }
    Provisioned {
        created: Some(created),
        handle,
    }
}
