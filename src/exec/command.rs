// src/exec/command.rs

//! Description of a single external invocation, plus the run-to-completion
//! path used for short helper tools.

use std::fmt;
use std::process::{Output, Stdio};

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::debug;

use super::env::CommandEnv;

/// Program, arguments and environment of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: CommandEnv,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, env: CommandEnv) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Build the tokio command. The child sees only `self.env`.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .envs(self.env.iter())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.argv().iter().map(|a| shell_quote(a)).collect();
        f.write_str(&rendered.join(" "))
    }
}

/// Quote an argument for display when it would otherwise be ambiguous.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Run a helper command to completion, capturing both streams.
///
/// Stderr lines are relayed to the log at debug level. A non-zero exit is an
/// error that carries the tail of stderr.
pub(crate) async fn run_to_completion(spec: &CommandSpec) -> Result<Output> {
    debug!(cmd = %spec, "starting helper process");

    let output = spec
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("spawning process `{}`", spec.program))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(program = %spec.program, "stderr: {}", line);
    }

    if !output.status.success() {
        let tail = stderr.trim();
        if tail.is_empty() {
            bail!("`{}` exited with {}", spec.program, output.status);
        }
        bail!("`{}` exited with {}: {}", spec.program, output.status, tail);
    }

    Ok(output)
}
