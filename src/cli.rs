// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::RawBackupConfig;

/// Command-line arguments for `borgsnap`.
///
/// `--source` and `--mountpoint` are repeatable and paired by position:
/// `--source / --source /System/Volumes/Data --mountpoint /tmp/snapshot
/// --mountpoint /tmp/snapshot-data`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "borgsnap",
    version,
    about = "Back up APFS snapshots with borg.",
    long_about = "Back up APFS snapshots with borg.\n\n\
This program must be run as root.\n\n\
Environment variables:\n\
- BORG_REPO: repository to backup to\n\
- BORG_PASSPHRASE: passphrase for borg repository"
)]
pub struct CliArgs {
    /// Source(s) to back up.
    #[arg(long = "source", value_name = "PATH")]
    pub sources: Vec<String>,

    /// Mountpoint(s) for snapshot(s); keep them the same across backups.
    #[arg(long = "mountpoint", value_name = "PATH")]
    pub mountpoints: Vec<String>,

    /// Existing snapshot to use for the source at the same position
    /// (repeatable; pass "" to resolve that source normally).
    #[arg(long = "snapshot", value_name = "NAME")]
    pub snapshots: Vec<String>,

    /// Arguments passed to `borg create`.
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub borg_args: Option<String>,

    /// Lock file (default: /var/run/borg.lock).
    #[arg(long, value_name = "PATH")]
    pub lock_file: Option<String>,

    /// Use the latest existing snapshot on each source instead of creating one.
    #[arg(long)]
    pub use_existing_snapshots: bool,

    /// Create and remove snapshots, but only print the borg command instead of
    /// running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Archive name (default: `<snapshot label>@<hostname>`).
    #[arg(long, value_name = "NAME")]
    pub archive_name: Option<String>,

    /// Optional TOML config file; flags override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BORGSNAP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Overlay these flags on a (possibly file-backed) raw config.
    ///
    /// List flags replace the file's list when given; switches can only turn a
    /// behaviour on.
    pub fn apply_to(&self, mut raw: RawBackupConfig) -> RawBackupConfig {
        if !self.sources.is_empty() {
            raw.sources = self.sources.clone();
        }
        if !self.mountpoints.is_empty() {
            raw.mountpoints = self.mountpoints.clone();
        }
        if !self.snapshots.is_empty() {
            raw.snapshots = self.snapshots.clone();
        }
        if let Some(args) = &self.borg_args {
            raw.borg_args = args.clone();
        }
        if let Some(lock_file) = &self.lock_file {
            raw.lock_file = lock_file.clone();
        }
        if let Some(name) = &self.archive_name {
            raw.archive_name = Some(name.clone());
        }
        raw.use_existing_snapshots |= self.use_existing_snapshots;
        raw.dry_run |= self.dry_run;
        raw
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_flags_pair_by_position() {
        let args = CliArgs::try_parse_from([
            "borgsnap",
            "--source",
            "/",
            "--source",
            "/System/Volumes/Data",
            "--mountpoint",
            "/tmp/snapshot",
            "--mountpoint",
            "/tmp/snapshot-data",
            "--borg-args",
            "--stats --progress",
        ])
        .unwrap();

        assert_eq!(args.sources, vec!["/", "/System/Volumes/Data"]);
        assert_eq!(args.mountpoints, vec!["/tmp/snapshot", "/tmp/snapshot-data"]);
        assert_eq!(args.borg_args.as_deref(), Some("--stats --progress"));
    }

    #[test]
    fn flags_override_file_values() {
        let file = RawBackupConfig {
            sources: vec!["/file".into()],
            mountpoints: vec!["/mnt/file".into()],
            lock_file: "/tmp/file.lock".into(),
            dry_run: false,
            ..RawBackupConfig::default()
        };
        let args = CliArgs {
            sources: vec!["/cli".into()],
            dry_run: true,
            ..CliArgs::default()
        };

        let merged = args.apply_to(file);
        assert_eq!(merged.sources, vec!["/cli"]);
        assert_eq!(merged.mountpoints, vec!["/mnt/file"]);
        assert_eq!(merged.lock_file, "/tmp/file.lock");
        assert!(merged.dry_run);
    }
}
