// src/snapshot/label.rs

//! Snapshot handle labels.
//!
//! System snapshots are named as five dot-separated parts, e.g.
//! `com.apple.TimeMachine.2024-01-01-120000.local`; the fourth part is the
//! timestamp label. Handles of any other shape are still usable: they are
//! simply their own label.

use tracing::debug;

use crate::errors::{BackupError, Result};

const STRUCTURED_PARTS: usize = 5;
const LABEL_PART: usize = 3;

/// Strictly parse the label out of a five-part handle.
pub fn structured_label(handle: &str) -> Result<&str> {
    let parts: Vec<&str> = handle.split('.').collect();
    if parts.len() != STRUCTURED_PARTS {
        return Err(BackupError::UnrecognizedSnapshotLabel {
            snapshot: handle.to_string(),
        });
    }
    Ok(parts[LABEL_PART])
}

/// Label used for display and archive naming. Never fails.
pub fn display_label(handle: &str) -> &str {
    match structured_label(handle) {
        Ok(label) => label,
        Err(err) => {
            debug!(snapshot = %handle, reason = %err, "using snapshot handle as its own label");
            handle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_part_handle_yields_timestamp() {
        let handle = "com.example.snap.2024-01-01-120000.local";
        assert_eq!(structured_label(handle).unwrap(), "2024-01-01-120000");
        assert_eq!(display_label(handle), "2024-01-01-120000");
    }

    #[test]
    fn other_shapes_are_their_own_label() {
        for handle in ["nightly", "2024-01-01 12:00:00", "a.b.c", "a.b.c.d.e.f"] {
            assert!(matches!(
                structured_label(handle),
                Err(BackupError::UnrecognizedSnapshotLabel { .. })
            ));
            assert_eq!(display_label(handle), handle);
        }
    }
}
