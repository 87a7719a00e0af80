// src/config/mod.rs

//! Configuration loading and validation for borgsnap.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the source/mountpoint pairing into a `BackupConfig`
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{BackupConfig, RawBackupConfig, ToolsSection, split_borg_args};
