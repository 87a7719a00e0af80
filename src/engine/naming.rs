// src/engine/naming.rs

use crate::snapshot::display_label;
use crate::types::ResolvedSnapshot;

/// Archive name for a run.
///
/// An explicit name wins. Otherwise the label of the first resolved snapshot
/// (or `now` when the first source is archived live) is joined with the
/// hostname: `2024-01-01-120000@myhost`.
pub fn derive_archive_name(
    explicit: Option<&str>,
    resolved: &[ResolvedSnapshot],
    hostname: &str,
    now: &str,
) -> String {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let label = match resolved.first() {
        Some(first) if !first.is_live() => display_label(&first.handle),
        _ => now,
    };
    format!("{label}@{hostname}")
}
