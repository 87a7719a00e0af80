// src/engine/mod.rs

//! Backup orchestration engine.
//!
//! This module ties together:
//! - the exclusive run lock
//! - parallel snapshot provisioning
//! - sequential mounting, in source order
//! - the archive step, the only cancellable phase
//! - unconditional teardown (unmount, then destroy)
//!
//! The phase bookkeeping lives in [`state`], the ordered cleanup list in
//! [`teardown`], archive naming in [`naming`], and the async driver in
//! [`orchestrator`].

/// Phases of a single backup run.
///
/// `Aborted` is reachable from every phase on an unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Locking,
    Provisioning,
    Mounting,
    Archiving,
    Unmounting,
    Destroying,
    Done,
    Aborted,
}

pub mod naming;
pub mod orchestrator;
pub mod state;
pub mod teardown;

pub use naming::derive_archive_name;
pub use orchestrator::{Orchestrator, RunSummary};
pub use state::RunState;
pub use teardown::{Teardown, TeardownAction, TeardownReport};
