//! Runs backend CLIs as child processes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ToolError;
use crate::port::outbound::{CommandOutput, CommandRunner, Invocation};

/// [`CommandRunner`] over `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);
        command
    }

    fn spawn_error(invocation: &Invocation, source: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: invocation.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn look_path(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError> {
        debug!(command = %invocation, "running");
        let mut command = Self::command(invocation);
        command
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| Self::spawn_error(invocation, e))?;
        if let (Some(input), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
            stdin
                .write_all(input)
                .await
                .map_err(|e| Self::spawn_error(invocation, e))?;
            // Closing stdin signals EOF to tools reading a config from `-`.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::spawn_error(invocation, e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ToolError::Exit {
                program: invocation.program.clone(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }

    async fn spawn_detached(&self, invocation: &Invocation) -> Result<(), ToolError> {
        debug!(command = %invocation, "starting in background");
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
            .spawn()
            .map_err(|e| Self::spawn_error(invocation, e))?;
        Ok(())
    }
}
