// src/engine/teardown.rs

//! Ordered list of cleanup actions registered while a run acquires resources.
//!
//! Actions are registered the moment the resource exists (a snapshot created,
//! a mount bound) and executed unconditionally once the primary path ends:
//! all unmounts first, then all snapshot removals, each in source order.
//!
//! Destroy failures are logged and collected while the remaining actions are
//! still attempted. An unmount failure halts teardown on the spot: nothing
//! after it runs, and the report is marked as halted.

use tracing::{error, info};

use crate::errors::BackupError;
use crate::mount::Mounter;
use crate::snapshot::SnapshotProvisioner;

use super::Phase;
use super::state::RunState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownAction {
    Unmount {
        index: usize,
        mountpoint: String,
    },
    Destroy {
        index: usize,
        snapshot: String,
        source: String,
    },
}

#[derive(Debug, Clone)]
struct PendingUnmount {
    index: usize,
    mountpoint: String,
}

#[derive(Debug, Clone)]
struct PendingDestroy {
    index: usize,
    snapshot: String,
    source: String,
}

#[derive(Debug, Default)]
pub struct Teardown {
    unmounts: Vec<PendingUnmount>,
    destroys: Vec<PendingDestroy>,
}

/// What teardown did.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub unmounted: usize,
    pub destroyed: usize,
    pub errors: Vec<BackupError>,
    /// An unmount failed and the remaining actions were skipped.
    pub halted: bool,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_unmount(&mut self, index: usize, mountpoint: impl Into<String>) {
        self.unmounts.push(PendingUnmount {
            index,
            mountpoint: mountpoint.into(),
        });
    }

    pub fn push_destroy(
        &mut self,
        index: usize,
        snapshot: impl Into<String>,
        source: impl Into<String>,
    ) {
        self.destroys.push(PendingDestroy {
            index,
            snapshot: snapshot.into(),
            source: source.into(),
        });
    }

    /// Actions in execution order.
    pub fn actions(&self) -> impl Iterator<Item = TeardownAction> + '_ {
        let unmounts = self.unmounts.iter().map(|u| TeardownAction::Unmount {
            index: u.index,
            mountpoint: u.mountpoint.clone(),
        });
        let destroys = self.destroys.iter().map(|d| TeardownAction::Destroy {
            index: d.index,
            snapshot: d.snapshot.clone(),
            source: d.source.clone(),
        });
        unmounts.chain(destroys)
    }

    pub fn len(&self) -> usize {
        self.unmounts.len() + self.destroys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered action, consuming the list so it cannot run twice.
    pub async fn execute<M, P>(self, mounter: &M, snapshots: &P, state: &mut RunState) -> TeardownReport
    where
        M: Mounter + ?Sized,
        P: SnapshotProvisioner + ?Sized,
    {
        let mut report = TeardownReport::default();

        state.advance(Phase::Unmounting);
        for PendingUnmount { index, mountpoint } in &self.unmounts {
            info!(index, mountpoint = %mountpoint, "unmounting");
            match mounter.unmount(mountpoint).await {
                Ok(()) => {
                    info!(mountpoint = %mountpoint, "unmounted");
                    report.unmounted += 1;
                }
                Err(err) => {
                    error!(
                        mountpoint = %mountpoint,
                        error = %err,
                        "unmount failed; halting cleanup, manual intervention required"
                    );
                    report.errors.push(err);
                    report.halted = true;
                    return report;
                }
            }
        }

        state.advance(Phase::Destroying);
        for PendingDestroy {
            index,
            snapshot,
            source,
        } in &self.destroys
        {
            info!(index, snapshot = %snapshot, source = %source, "removing snapshot");
            match snapshots.destroy(snapshot, source).await {
                Ok(()) => {
                    info!(snapshot = %snapshot, source = %source, "removed snapshot");
                    report.destroyed += 1;
                }
                Err(err) => {
                    error!(snapshot = %snapshot, source = %source, error = %err, "failed to remove snapshot");
                    report.errors.push(err);
                }
            }
        }

        report
    }
}
