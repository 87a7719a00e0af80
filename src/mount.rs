// src/mount.rs

//! Binding snapshots to mountpoints and reversing the binding.
//!
//! Mounting goes through the `mount_apfs` helper (there is no mount syscall
//! wrapper for APFS snapshots); unmounting is a direct syscall.

use std::path::Path;

use anyhow::Context;
use nix::mount::MntFlags;
use tracing::info;

use crate::errors::{BackupError, Result};
use crate::exec::{CommandEnv, CommandRunner, CommandSpec};
use crate::types::BoxFuture;

pub trait Mounter: Send + Sync {
    /// Mount a read-only, non-browsable view of `snapshot` of `source` at
    /// `mountpoint`.
    fn mount<'a>(
        &'a self,
        snapshot: &'a str,
        source: &'a str,
        mountpoint: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Unmount whatever is mounted at `mountpoint`.
    ///
    /// A failure here means mount state is no longer what the run believes it
    /// is; callers must stop and leave the rest to an operator.
    fn unmount<'a>(&'a self, mountpoint: &'a str) -> BoxFuture<'a, Result<()>>;
}

pub struct SystemMounter<R> {
    runner: R,
    program: String,
    env: CommandEnv,
}

impl<R: CommandRunner> SystemMounter<R> {
    /// `env` is sanitized here, so callers may pass the full environment.
    pub fn new(runner: R, program: impl Into<String>, env: &CommandEnv) -> Self {
        Self {
            runner,
            program: program.into(),
            env: env.sanitized(),
        }
    }

    fn mount_spec(&self, snapshot: &str, source: &str, mountpoint: &str) -> CommandSpec {
        CommandSpec::new(&self.program, self.env.clone())
            .args(["-o", "ro,nobrowse", "-s"])
            .arg(snapshot)
            .arg(source)
            .arg(mountpoint)
    }
}

impl<R: CommandRunner> Mounter for SystemMounter<R> {
    fn mount<'a>(
        &'a self,
        snapshot: &'a str,
        source: &'a str,
        mountpoint: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let spec = self.mount_spec(snapshot, source, mountpoint);
            info!(cmd = %spec, "mounting snapshot");
            self.runner
                .run(spec)
                .await
                .map_err(|cause| BackupError::MountFailure {
                    snapshot: snapshot.to_string(),
                    source_path: source.to_string(),
                    mountpoint: mountpoint.to_string(),
                    cause,
                })
        })
    }

    fn unmount<'a>(&'a self, mountpoint: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sys_unmount(Path::new(mountpoint))
                .with_context(|| format!("unmount syscall on {mountpoint}"))
                .map_err(|cause| BackupError::UnmountFailure {
                    mountpoint: mountpoint.to_string(),
                    cause,
                })
        })
    }
}

#[cfg(target_os = "linux")]
fn sys_unmount(path: &Path) -> nix::Result<()> {
    nix::mount::umount2(path, MntFlags::empty())
}

#[cfg(not(target_os = "linux"))]
fn sys_unmount(path: &Path) -> nix::Result<()> {
    nix::mount::unmount(path, MntFlags::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TokioCommandRunner;

    #[test]
    fn mount_spec_is_read_only_and_sanitized() {
        let env = CommandEnv::default().with_var("BORG_PASSPHRASE", "hunter2");
        let mounter = SystemMounter::new(TokioCommandRunner, "mount_apfs", &env);

        let spec = mounter.mount_spec("snap", "/", "/tmp/snapshot");
        assert_eq!(
            spec.argv(),
            vec!["mount_apfs", "-o", "ro,nobrowse", "-s", "snap", "/", "/tmp/snapshot"]
        );
        assert_eq!(spec.env.get("BORG_PASSPHRASE"), Some(""));
    }

    #[tokio::test]
    async fn unmounting_a_plain_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mounter = SystemMounter::new(TokioCommandRunner, "mount_apfs", &CommandEnv::default());

        let mountpoint = dir.path().to_string_lossy().into_owned();
        let err = mounter.unmount(&mountpoint).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
