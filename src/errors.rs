// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every failure carries the identifiers needed to diagnose it (which source,
//! mountpoint or snapshot). Tool-level failures arrive as `anyhow::Error` from
//! the [`crate::exec`] layer and are wrapped into the matching variant here.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Exit status for an unrecovered, non-fatal error.
pub const EXIT_FAILURE: i32 = 1;

/// Exit status when mount state may be inconsistent and an operator has to
/// clean up by hand.
pub const EXIT_MANUAL_CLEANUP: i32 = 2;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Preflight check failed: {0}")]
    Preflight(String),

    #[error("error while acquiring file lock {} (maybe another process running?)", .path.display())]
    LockBusy { path: PathBuf },

    #[error("error while opening lock file {}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("error while creating snapshot for source {source_path}")]
    ProvisionFailure {
        source_path: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("error while finding latest snapshot for source {source_path}")]
    DiscoveryFailure {
        source_path: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("no available snapshots for source {source_path}")]
    NoSnapshotsAvailable { source_path: String },

    #[error("error while mounting snapshot {snapshot} of {source_path} at {mountpoint}")]
    MountFailure {
        snapshot: String,
        source_path: String,
        mountpoint: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("unmount {mountpoint} failed, need manual cleanup")]
    UnmountFailure {
        mountpoint: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("error while running archive tool")]
    ArchiveFailure {
        #[source]
        cause: anyhow::Error,
    },

    #[error("error while removing snapshot {snapshot} for source {source_path}")]
    DestroyFailure {
        snapshot: String,
        source_path: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("unrecognized snapshot format: {snapshot}")]
    UnrecognizedSnapshotLabel { snapshot: String },

    #[error("error while getting hostname: {0}")]
    Hostname(String),

    #[error("cleanup failed: {}", describe_all(.0))]
    Cleanup(Vec<BackupError>),

    #[error("{} (cleanup also failed: {})", describe(.primary.as_ref()), describe_all(.cleanup))]
    WithCleanup {
        primary: Box<BackupError>,
        cleanup: Vec<BackupError>,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackupError {
    /// Attach teardown failures to the error that ended the primary path.
    ///
    /// The primary error always stays first; an empty `cleanup` list returns
    /// it untouched.
    pub fn with_cleanup(primary: BackupError, cleanup: Vec<BackupError>) -> BackupError {
        if cleanup.is_empty() {
            return primary;
        }
        BackupError::WithCleanup {
            primary: Box::new(primary),
            cleanup,
        }
    }

    /// Fold teardown failures into a single error when the primary path
    /// succeeded. Returns `None` when there is nothing to report.
    pub fn from_cleanup(mut cleanup: Vec<BackupError>) -> Option<BackupError> {
        match cleanup.len() {
            0 => None,
            1 => cleanup.pop(),
            _ => Some(BackupError::Cleanup(cleanup)),
        }
    }

    /// True when an unmount failed anywhere in this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            BackupError::UnmountFailure { .. } => true,
            BackupError::Cleanup(errors) => errors.iter().any(BackupError::is_fatal),
            BackupError::WithCleanup { primary, cleanup } => {
                primary.is_fatal() || cleanup.iter().any(BackupError::is_fatal)
            }
            _ => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            EXIT_MANUAL_CLEANUP
        } else {
            EXIT_FAILURE
        }
    }
}

/// Render an error and its whole `source()` chain on one line.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        next = cause.source();
    }
    out
}

/// Final diagnostic printed by the binary for a failed run.
pub fn failure_report(err: &BackupError) -> String {
    if err.is_fatal() {
        format!(
            "borgsnap fatal error: {}\nmount state is inconsistent; manual cleanup required",
            describe(err)
        )
    } else {
        format!("borgsnap error: {}", describe(err))
    }
}

fn describe_all(errors: &[BackupError]) -> String {
    errors
        .iter()
        .map(|e| describe(e))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn unmount_failure() -> BackupError {
        BackupError::UnmountFailure {
            mountpoint: "/mnt/a".into(),
            cause: anyhow!("device busy"),
        }
    }

    #[test]
    fn with_cleanup_keeps_primary_first() {
        let primary = BackupError::ArchiveFailure {
            cause: anyhow!("exit status 2"),
        };
        let cleanup = vec![BackupError::DestroyFailure {
            snapshot: "snap".into(),
            source_path: "/a".into(),
            cause: anyhow!("tool missing"),
        }];

        let msg = BackupError::with_cleanup(primary, cleanup).to_string();
        assert!(msg.starts_with("error while running archive tool: exit status 2"));
        assert!(msg.contains("cleanup also failed"));
        assert!(msg.contains("snapshot snap for source /a: tool missing"));
    }

    #[test]
    fn with_cleanup_without_failures_is_identity() {
        let err = BackupError::with_cleanup(BackupError::Config("x".into()), Vec::new());
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn from_cleanup_collapses_single_error() {
        assert!(BackupError::from_cleanup(Vec::new()).is_none());
        let single = BackupError::from_cleanup(vec![unmount_failure()]);
        assert!(matches!(single, Some(BackupError::UnmountFailure { .. })));
        let many = BackupError::from_cleanup(vec![unmount_failure(), unmount_failure()]);
        assert!(matches!(many, Some(BackupError::Cleanup(ref v)) if v.len() == 2));
    }

    #[test]
    fn failure_report_states_the_cause_once() {
        let report = failure_report(&unmount_failure());
        assert_eq!(report.matches("unmount /mnt/a failed").count(), 1);
        assert!(report.contains("device busy"));
        assert!(report.ends_with("manual cleanup required"));

        let report = failure_report(&BackupError::Config("no sources".into()));
        assert_eq!(report, "borgsnap error: Configuration error: no sources");
    }

    #[test]
    fn fatal_detection_looks_through_aggregates() {
        assert!(unmount_failure().is_fatal());
        let nested = BackupError::with_cleanup(
            BackupError::Config("bad".into()),
            vec![unmount_failure()],
        );
        assert!(nested.is_fatal());
        assert_eq!(nested.exit_code(), EXIT_MANUAL_CLEANUP);
        assert_eq!(BackupError::Config("bad".into()).exit_code(), EXIT_FAILURE);
    }
}
