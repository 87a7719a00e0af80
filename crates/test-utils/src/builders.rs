#![allow(dead_code)]

use std::path::Path;

use borgsnap::config::{BackupConfig, RawBackupConfig};

/// Builder for `BackupConfig` to simplify test setup.
///
/// The lock file defaults to a path inside the given directory so tests never
/// touch `/var/run`.
pub struct BackupConfigBuilder {
    config: RawBackupConfig,
}

impl BackupConfigBuilder {
    pub fn new(lock_dir: &Path) -> Self {
        Self {
            config: RawBackupConfig {
                lock_file: lock_dir.join("borg.lock").to_string_lossy().into_owned(),
                ..RawBackupConfig::default()
            },
        }
    }

    /// Add a source/mountpoint pair.
    pub fn pair(mut self, source: &str, mountpoint: &str) -> Self {
        self.config.sources.push(source.to_string());
        self.config.mountpoints.push(mountpoint.to_string());
        self
    }

    pub fn snapshots(mut self, snapshots: &[&str]) -> Self {
        self.config.snapshots = snapshots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn borg_args(mut self, args: &str) -> Self {
        self.config.borg_args = args.to_string();
        self
    }

    pub fn use_existing_snapshots(mut self, val: bool) -> Self {
        self.config.use_existing_snapshots = val;
        self
    }

    pub fn dry_run(mut self, val: bool) -> Self {
        self.config.dry_run = val;
        self
    }

    pub fn archive_name(mut self, name: &str) -> Self {
        self.config.archive_name = Some(name.to_string());
        self
    }

    pub fn lock_file(mut self, path: &Path) -> Self {
        self.config.lock_file = path.to_string_lossy().into_owned();
        self
    }

    pub fn raw(self) -> RawBackupConfig {
        self.config
    }

    pub fn build(self) -> BackupConfig {
        BackupConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
