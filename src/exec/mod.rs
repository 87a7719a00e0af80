// src/exec/mod.rs

//! Process execution layer.
//!
//! Every external tool (snapshot utility, mount helper, archiver) is started
//! through a [`CommandRunner`], using `tokio::process::Command`.
//!
//! - [`env`] holds the immutable environment map handed to each child, and
//!   the redaction of archive secrets for non-archive tools.
//! - [`command`] describes a single invocation (`CommandSpec`) and runs short
//!   helper commands to completion.
//! - [`supervise`] runs a long-lived child that can be interrupted through a
//!   cancellation token.
//! - [`backend`] provides the `CommandRunner` trait and the production
//!   `TokioCommandRunner`; tests swap in a recording fake.

pub mod backend;
pub mod command;
pub mod env;
pub mod supervise;

pub use backend::{CommandRunner, TokioCommandRunner};
pub use command::CommandSpec;
pub use env::{CommandEnv, SECRET_VARS};
pub use supervise::SupervisedExit;
