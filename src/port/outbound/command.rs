//! External command port.
//!
//! Backend CLIs are driven with a constructed argv and optional stdin; exit
//! status and captured output are the only feedback.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ToolError;

/// A command line to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// True if the argv starts with `prefix` (after the program name).
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }

    /// Value following a `--flag value` pair.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn stdin_text(&self) -> Option<&str> {
        self.stdin.as_deref().and_then(|s| std::str::from_utf8(s).ok())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Resolve a program on `PATH`.
    fn look_path(&self, program: &str) -> Option<PathBuf>;

    /// Run to completion. A non-zero exit is an error.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError>;

    /// Start a long-lived process and return without waiting for it.
    async fn spawn_detached(&self, invocation: &Invocation) -> Result<(), ToolError>;
}
