// src/snapshot/mod.rs

//! Point-in-time snapshot provisioning.
//!
//! - [`provisioner`] defines the `SnapshotProvisioner` seam and the APFS
//!   implementation that shells out to the snapshot utilities.
//! - [`label`] extracts a human-meaningful label from a snapshot handle.

pub mod label;
pub mod provisioner;

pub use label::{display_label, structured_label};
pub use provisioner::{ApfsSnapshots, SnapshotProvisioner, SnapshotTools};
