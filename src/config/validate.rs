// src/config/validate.rs

use crate::config::model::{BackupConfig, RawBackupConfig};
use crate::errors::{BackupError, Result};

impl TryFrom<RawBackupConfig> for BackupConfig {
    type Error = BackupError;

    fn try_from(raw: RawBackupConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(BackupConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawBackupConfig) -> Result<()> {
    ensure_has_pairs(cfg)?;
    validate_pairing(cfg)?;
    validate_snapshots(cfg)?;
    validate_lock_file(cfg)?;
    Ok(())
}

fn ensure_has_pairs(cfg: &RawBackupConfig) -> Result<()> {
    if cfg.mountpoints.is_empty() {
        return Err(BackupError::Config(
            "need at least one mountpoint, such as `--mountpoint /tmp/snapshot`".to_string(),
        ));
    }
    if cfg.sources.is_empty() {
        return Err(BackupError::Config(
            "need at least one source, such as `--source /`".to_string(),
        ));
    }
    Ok(())
}

fn validate_pairing(cfg: &RawBackupConfig) -> Result<()> {
    if cfg.mountpoints.len() != cfg.sources.len() {
        return Err(BackupError::Config(format!(
            "the number of mountpoints provided ({}) is not the same as the number of sources provided ({})",
            cfg.mountpoints.len(),
            cfg.sources.len()
        )));
    }
    for (index, (source, mountpoint)) in cfg.sources.iter().zip(&cfg.mountpoints).enumerate() {
        if source.is_empty() || mountpoint.is_empty() {
            return Err(BackupError::Config(format!(
                "source and mountpoint #{index} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_snapshots(cfg: &RawBackupConfig) -> Result<()> {
    if !cfg.snapshots.is_empty() && cfg.snapshots.len() != cfg.sources.len() {
        return Err(BackupError::Config(format!(
            "the number of snapshots provided ({}) must be zero or match the number of sources ({})",
            cfg.snapshots.len(),
            cfg.sources.len()
        )));
    }
    Ok(())
}

fn validate_lock_file(cfg: &RawBackupConfig) -> Result<()> {
    if cfg.lock_file.trim().is_empty() {
        return Err(BackupError::Config("lock_file must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sources: &[&str], mountpoints: &[&str]) -> RawBackupConfig {
        RawBackupConfig {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            mountpoints: mountpoints.iter().map(|s| s.to_string()).collect(),
            ..RawBackupConfig::default()
        }
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let err = BackupConfig::try_from(raw(&["/a", "/b"], &["/mnt/a"])).unwrap_err();
        match err {
            BackupError::Config(msg) => {
                assert!(msg.contains("(1)"));
                assert!(msg.contains("(2)"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_lists_are_rejected() {
        assert!(BackupConfig::try_from(raw(&[], &[])).is_err());
        assert!(BackupConfig::try_from(raw(&["/a"], &[])).is_err());
    }

    #[test]
    fn snapshot_list_must_match_when_present() {
        let mut cfg = raw(&["/a", "/b"], &["/mnt/a", "/mnt/b"]);
        cfg.snapshots = vec!["only-one".into()];
        assert!(BackupConfig::try_from(cfg.clone()).is_err());

        cfg.snapshots = vec!["one".into(), String::new()];
        assert!(BackupConfig::try_from(cfg).is_ok());
    }

    #[test]
    fn paired_config_is_accepted() {
        let cfg = BackupConfig::try_from(raw(&["/a", "/b"], &["/mnt/a", "/b"])).unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.lock_file().to_str(), Some("/var/run/borg.lock"));
    }
}
