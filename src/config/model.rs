// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration as read from a TOML file (and then overlaid by CLI flags).
///
/// ```toml
/// sources = ["/", "/System/Volumes/Data"]
/// mountpoints = ["/tmp/snapshot", "/tmp/snapshot-data"]
/// borg_args = "--stats --compression zstd"
/// lock_file = "/var/run/borg.lock"
///
/// [tools]
/// archiver = "/opt/homebrew/bin/borg"
/// ```
///
/// Every key is optional here; pairing rules are checked when converting into
/// [`BackupConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackupConfig {
    #[serde(default)]
    pub sources: Vec<String>,

    /// Positionally paired with `sources`.
    #[serde(default)]
    pub mountpoints: Vec<String>,

    /// Pre-existing snapshot per source (empty string = none). Either empty or
    /// the same length as `sources`.
    #[serde(default)]
    pub snapshots: Vec<String>,

    /// Extra arguments for `borg create`, whitespace separated.
    #[serde(default)]
    pub borg_args: String,

    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    #[serde(default)]
    pub use_existing_snapshots: bool,

    #[serde(default)]
    pub dry_run: bool,

    /// Explicit archive name; derived from the first snapshot when unset.
    #[serde(default)]
    pub archive_name: Option<String>,

    #[serde(default)]
    pub tools: ToolsSection,
}

fn default_lock_file() -> String {
    "/var/run/borg.lock".to_string()
}

impl Default for RawBackupConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            mountpoints: Vec::new(),
            snapshots: Vec::new(),
            borg_args: String::new(),
            lock_file: default_lock_file(),
            use_existing_snapshots: false,
            dry_run: false,
            archive_name: None,
            tools: ToolsSection::default(),
        }
    }
}

/// `[tools]` section: paths of the external programs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    #[serde(default = "default_snapshot_util")]
    pub snapshot_util: String,

    #[serde(default = "default_snapshot_lister")]
    pub snapshot_lister: String,

    #[serde(default = "default_mount")]
    pub mount: String,

    #[serde(default = "default_archiver")]
    pub archiver: String,
}

// Creating snapshots needs the `com.apple.developer.vfs.snapshot`
// entitlement, which `tmutil` does not expose per volume.
fn default_snapshot_util() -> String {
    "./apfs/snapUtil".to_string()
}

fn default_snapshot_lister() -> String {
    "tmutil".to_string()
}

fn default_mount() -> String {
    "mount_apfs".to_string()
}

fn default_archiver() -> String {
    "borg".to_string()
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            snapshot_util: default_snapshot_util(),
            snapshot_lister: default_snapshot_lister(),
            mount: default_mount(),
            archiver: default_archiver(),
        }
    }
}

/// Validated configuration for one backup run.
///
/// Construct through `TryFrom<RawBackupConfig>`; the pairing invariants hold
/// for every value of this type.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    sources: Vec<String>,
    mountpoints: Vec<String>,
    snapshots: Vec<String>,
    borg_args: Vec<String>,
    lock_file: PathBuf,
    use_existing_snapshots: bool,
    dry_run: bool,
    archive_name: Option<String>,
    tools: ToolsSection,
}

impl BackupConfig {
    pub(crate) fn new_unchecked(raw: RawBackupConfig) -> Self {
        let archive_name = raw.archive_name.filter(|name| !name.is_empty());
        Self {
            borg_args: split_borg_args(&raw.borg_args),
            sources: raw.sources,
            mountpoints: raw.mountpoints,
            snapshots: raw.snapshots,
            lock_file: PathBuf::from(raw.lock_file),
            use_existing_snapshots: raw.use_existing_snapshots,
            dry_run: raw.dry_run,
            archive_name,
            tools: raw.tools,
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn mountpoints(&self) -> &[String] {
        &self.mountpoints
    }

    /// Caller-supplied snapshot for `index`, if any.
    pub fn snapshot_for(&self, index: usize) -> Option<&str> {
        self.snapshots
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn borg_args(&self) -> &[String] {
        &self.borg_args
    }

    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    pub fn use_existing_snapshots(&self) -> bool {
        self.use_existing_snapshots
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn archive_name(&self) -> Option<&str> {
        self.archive_name.as_deref()
    }

    pub fn tools(&self) -> &ToolsSection {
        &self.tools
    }

    /// Number of source/mountpoint pairs.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Split the free-text archive argument string, dropping empty pieces.
pub fn split_borg_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borg_args_ignore_repeated_spaces() {
        assert_eq!(
            split_borg_args("  --stats   --exclude-caches "),
            vec!["--stats", "--exclude-caches"]
        );
        assert!(split_borg_args("").is_empty());
    }

    #[test]
    fn empty_archive_name_means_derived() {
        let raw = RawBackupConfig {
            archive_name: Some(String::new()),
            ..RawBackupConfig::default()
        };
        assert_eq!(BackupConfig::new_unchecked(raw).archive_name(), None);
    }

    #[test]
    fn blank_caller_snapshot_is_none() {
        let raw = RawBackupConfig {
            sources: vec!["/a".into(), "/b".into()],
            mountpoints: vec!["/mnt/a".into(), "/mnt/b".into()],
            snapshots: vec![String::new(), "keep".into()],
            ..RawBackupConfig::default()
        };
        let cfg = BackupConfig::new_unchecked(raw);
        assert_eq!(cfg.snapshot_for(0), None);
        assert_eq!(cfg.snapshot_for(1), Some("keep"));
        assert_eq!(cfg.snapshot_for(2), None);
    }
}
