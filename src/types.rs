use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by the pluggable seams (command runner,
/// snapshot provisioner, mounter).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Who is responsible for a resolved snapshot handle.
///
/// - `Owned`: created by this run; destroyed during teardown.
/// - `Borrowed`: pre-existing (caller-supplied or discovered); never destroyed.
/// - `Live`: no snapshot at all, the source itself is archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
    Live,
}

/// Snapshot handle resolved for one source, index-aligned with the sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSnapshot {
    pub handle: String,
    pub ownership: Ownership,
}

impl ResolvedSnapshot {
    pub fn owned(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ownership: Ownership::Owned,
        }
    }

    pub fn borrowed(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ownership: Ownership::Borrowed,
        }
    }

    pub fn live() -> Self {
        Self {
            handle: String::new(),
            ownership: Ownership::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_empty()
    }
}
