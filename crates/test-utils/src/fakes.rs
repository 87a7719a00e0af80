//! Recording fakes for the orchestrator seams.
//!
//! Each fake is cheap to clone; clones share state, so a test keeps one clone
//! for assertions and hands the other to the orchestrator.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

use borgsnap::errors::{BackupError, Result};
use borgsnap::exec::{CommandRunner, CommandSpec, SupervisedExit};
use borgsnap::mount::Mounter;
use borgsnap::snapshot::SnapshotProvisioner;
use borgsnap::types::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotCall {
    Create(String),
    Latest(String),
    Destroy { snapshot: String, source: String },
}

#[derive(Debug, Default)]
struct SnapshotState {
    existing: BTreeMap<String, Vec<String>>,
    labels: BTreeMap<String, VecDeque<String>>,
    fail_create: BTreeSet<String>,
    fail_latest: BTreeSet<String>,
    fail_destroy: BTreeSet<String>,
    create_delay: BTreeMap<String, Duration>,
    calls: Vec<SnapshotCall>,
    created: Vec<String>,
    counter: usize,
}

/// In-memory snapshot store. New snapshots are named
/// `com.example.snap.<label>.local`.
#[derive(Debug, Clone, Default)]
pub struct FakeSnapshots {
    state: Arc<Mutex<SnapshotState>>,
}

impl FakeSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the next snapshot created for `source`.
    pub fn with_next_label(self, source: &str, label: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .labels
            .entry(source.to_string())
            .or_default()
            .push_back(label.to_string());
        self
    }

    /// Seed an already existing snapshot for `source`.
    pub fn with_existing(self, source: &str, snapshot: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .existing
            .entry(source.to_string())
            .or_default()
            .push(snapshot.to_string());
        self
    }

    pub fn failing_create(self, source: &str) -> Self {
        self.state.lock().unwrap().fail_create.insert(source.to_string());
        self
    }

    /// `create` succeeds for `source` but listing its snapshots fails.
    pub fn failing_latest(self, source: &str) -> Self {
        self.state.lock().unwrap().fail_latest.insert(source.to_string());
        self
    }

    pub fn failing_destroy(self, source: &str) -> Self {
        self.state.lock().unwrap().fail_destroy.insert(source.to_string());
        self
    }

    pub fn with_create_delay(self, source: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .create_delay
            .insert(source.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<SnapshotCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Handles of every snapshot this fake created.
    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SnapshotCall::Create(_)))
            .count()
    }

    /// Snapshots passed to `destroy`, in call order.
    pub fn destroyed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SnapshotCall::Destroy { snapshot, .. } => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    pub fn existing(&self, source: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .existing
            .get(source)
            .cloned()
            .unwrap_or_default()
    }
}

impl SnapshotProvisioner for FakeSnapshots {
    fn create<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(SnapshotCall::Create(source.to_string()));
                state.create_delay.get(source).copied()
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if state.fail_create.contains(source) {
                return Err(BackupError::ProvisionFailure {
                    source_path: source.to_string(),
                    cause: anyhow!("injected create failure"),
                });
            }
            state.counter += 1;
            let counter = state.counter;
            let label = state
                .labels
                .get_mut(source)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| format!("2024-01-01-1200{counter:02}"));
            let handle = format!("com.example.snap.{label}.local");
            state
                .existing
                .entry(source.to_string())
                .or_default()
                .push(handle.clone());
            state.created.push(handle.clone());
            Ok(handle)
        })
    }

    fn latest<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.calls.push(SnapshotCall::Latest(source.to_string()));
            if state.fail_latest.contains(source) {
                return Err(BackupError::DiscoveryFailure {
                    source_path: source.to_string(),
                    cause: anyhow!("injected listing failure"),
                });
            }
            state
                .existing
                .get(source)
                .and_then(|list| list.last().cloned())
                .ok_or_else(|| BackupError::NoSnapshotsAvailable {
                    source_path: source.to_string(),
                })
        })
    }

    fn destroy<'a>(&'a self, snapshot: &'a str, source: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.calls.push(SnapshotCall::Destroy {
                snapshot: snapshot.to_string(),
                source: source.to_string(),
            });
            if state.fail_destroy.contains(source) {
                return Err(BackupError::DestroyFailure {
                    snapshot: snapshot.to_string(),
                    source_path: source.to_string(),
                    cause: anyhow!("injected destroy failure"),
                });
            }
            if let Some(list) = state.existing.get_mut(source) {
                list.retain(|s| s != snapshot);
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Mount {
        snapshot: String,
        source: String,
        mountpoint: String,
    },
    Unmount(String),
}

#[derive(Debug, Default)]
struct MountState {
    fail_mount: BTreeSet<String>,
    fail_unmount: BTreeSet<String>,
    mounted: BTreeSet<String>,
    calls: Vec<MountCall>,
}

/// Records mounts and unmounts; failures are injected per mountpoint.
#[derive(Debug, Clone, Default)]
pub struct FakeMounter {
    state: Arc<Mutex<MountState>>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_mount(self, mountpoint: &str) -> Self {
        self.state.lock().unwrap().fail_mount.insert(mountpoint.to_string());
        self
    }

    pub fn failing_unmount(self, mountpoint: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_unmount
            .insert(mountpoint.to_string());
        self
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Mountpoints that were mounted successfully, in call order.
    pub fn successful_mounts(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter_map(|c| match c {
                MountCall::Mount { mountpoint, .. } if !state.fail_mount.contains(mountpoint) => {
                    Some(mountpoint.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Mountpoints passed to `unmount`, in call order.
    pub fn unmount_attempts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MountCall::Unmount(mountpoint) => Some(mountpoint),
                _ => None,
            })
            .collect()
    }

    /// Mountpoints still bound.
    pub fn mounted(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().mounted.clone()
    }
}

impl Mounter for FakeMounter {
    fn mount<'a>(
        &'a self,
        snapshot: &'a str,
        source: &'a str,
        mountpoint: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.calls.push(MountCall::Mount {
                snapshot: snapshot.to_string(),
                source: source.to_string(),
                mountpoint: mountpoint.to_string(),
            });
            if state.fail_mount.contains(mountpoint) {
                return Err(BackupError::MountFailure {
                    snapshot: snapshot.to_string(),
                    source_path: source.to_string(),
                    mountpoint: mountpoint.to_string(),
                    cause: anyhow!("injected mount failure"),
                });
            }
            state.mounted.insert(mountpoint.to_string());
            Ok(())
        })
    }

    fn unmount<'a>(&'a self, mountpoint: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.calls.push(MountCall::Unmount(mountpoint.to_string()));
            if state.fail_unmount.contains(mountpoint) {
                return Err(BackupError::UnmountFailure {
                    mountpoint: mountpoint.to_string(),
                    cause: anyhow!("injected unmount failure"),
                });
            }
            state.mounted.remove(mountpoint);
            Ok(())
        })
    }
}

/// How the fake archive child behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveBehaviour {
    /// Exit immediately with this code.
    Exit(i32),
    /// Run until cancelled, then report an interrupted exit.
    WaitForCancel,
    /// Fail to start.
    SpawnError,
}

#[derive(Debug)]
struct RunnerState {
    behaviour: ArchiveBehaviour,
    stdout: BTreeMap<String, String>,
    helpers: Vec<CommandSpec>,
    supervised: Vec<CommandSpec>,
}

/// Command runner that never starts a process.
#[derive(Debug, Clone)]
pub struct FakeRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new(ArchiveBehaviour::Exit(0))
    }
}

impl FakeRunner {
    pub fn new(behaviour: ArchiveBehaviour) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunnerState {
                behaviour,
                stdout: BTreeMap::new(),
                helpers: Vec::new(),
                supervised: Vec::new(),
            })),
        }
    }

    /// Stdout returned by `capture` for `program`.
    pub fn with_stdout(self, program: &str, stdout: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .stdout
            .insert(program.to_string(), stdout.to_string());
        self
    }

    /// Commands run through `capture` / `run`.
    pub fn helpers(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().helpers.clone()
    }

    /// Commands run through `supervise`.
    pub fn supervised(&self) -> Vec<CommandSpec> {
        self.state.lock().unwrap().supervised.clone()
    }
}

impl CommandRunner for FakeRunner {
    fn capture(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let out = state.stdout.get(&spec.program).cloned().unwrap_or_default();
            state.helpers.push(spec);
            Ok(out)
        })
    }

    fn run(&self, spec: CommandSpec) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().helpers.push(spec);
            Ok(())
        })
    }

    fn supervise(
        &self,
        spec: CommandSpec,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, anyhow::Result<SupervisedExit>> {
        Box::pin(async move {
            let behaviour = {
                let mut state = self.state.lock().unwrap();
                state.supervised.push(spec);
                state.behaviour
            };
            match behaviour {
                ArchiveBehaviour::Exit(code) => Ok(SupervisedExit {
                    code: Some(code),
                    success: code == 0,
                    interrupted: false,
                }),
                ArchiveBehaviour::WaitForCancel => {
                    cancel.cancelled().await;
                    Ok(SupervisedExit {
                        code: Some(2),
                        success: false,
                        interrupted: true,
                    })
                }
                ArchiveBehaviour::SpawnError => Err(anyhow!("no such file or directory")),
            }
        })
    }
}
