// src/exec/env.rs

//! Explicit environment maps for child processes.
//!
//! The ambient process environment is read once and never mutated. Each
//! invocation receives its own `CommandEnv`, and children are started with a
//! cleared environment populated only from that map.

use std::collections::BTreeMap;
use std::fmt;

/// Variables that carry the archive repository location and passphrase.
/// Only the archive tool may see them.
pub const SECRET_VARS: [&str; 2] = ["BORG_REPO", "BORG_PASSPHRASE"];

#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandEnv {
    vars: BTreeMap<String, String>,
}

impl CommandEnv {
    /// Snapshot the current process environment. Entries that are not valid
    /// UTF-8 are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Copy of this environment with the archive secrets blanked out.
    pub fn sanitized(&self) -> Self {
        let mut vars = self.vars.clone();
        for key in SECRET_VARS {
            vars.insert(key.to_string(), String::new());
        }
        Self { vars }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// Values never reach the logs.
impl fmt::Debug for CommandEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEnv")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_blanks_archive_secrets_only() {
        let env = CommandEnv::from_pairs([
            ("BORG_REPO", "ssh://backup/repo"),
            ("BORG_PASSPHRASE", "hunter2"),
            ("PATH", "/usr/bin"),
        ]);

        let safe = env.sanitized();
        assert_eq!(safe.get("BORG_REPO"), Some(""));
        assert_eq!(safe.get("BORG_PASSPHRASE"), Some(""));
        assert_eq!(safe.get("PATH"), Some("/usr/bin"));

        // The original map is untouched.
        assert_eq!(env.get("BORG_PASSPHRASE"), Some("hunter2"));
    }

    #[test]
    fn sanitized_overrides_even_when_secrets_absent() {
        let safe = CommandEnv::default().sanitized();
        assert_eq!(safe.len(), SECRET_VARS.len());
        assert!(safe.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn debug_output_hides_values() {
        let env = CommandEnv::default().with_var("BORG_PASSPHRASE", "hunter2");
        let rendered = format!("{env:?}");
        assert!(rendered.contains("BORG_PASSPHRASE"));
        assert!(!rendered.contains("hunter2"));
    }
}
