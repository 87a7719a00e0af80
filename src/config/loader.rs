// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{BackupConfig, RawBackupConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawBackupConfig`.
///
/// This only performs TOML deserialization; CLI flags are usually overlaid on
/// the result before validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawBackupConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawBackupConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it as-is.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BackupConfig> {
    let raw = load_from_path(&path)?;
    BackupConfig::try_from(raw)
}
