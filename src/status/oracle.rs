//! Runs the external status command and turns its output into a
//! [`LivenessSignal`].

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::document::{LivenessSignal, StatusDocument};
use crate::error::{Result, SyncError};

/// Label carried by [`SyncError::Timeout`] when the status command hangs.
pub const STATUS_OPERATION: &str = "status command";

/// Source of the per-tick liveness signal.
///
/// Implemented by [`CommandStatusOracle`] in production; tests substitute
/// scripted sources.
pub trait StatusOracle {
    /// Take one reading. Errors mean "indeterminate", never "not primary";
    /// deciding what indeterminate means is the caller's policy.
    fn poll(&self) -> impl Future<Output = Result<LivenessSignal>> + Send;
}

/// Status oracle backed by an external command such as
/// `tailscale status --json --self`.
#[derive(Debug, Clone)]
pub struct CommandStatusOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandStatusOracle {
    /// `command` is the program followed by its arguments. It is executed
    /// directly, without a shell.
    ///
    /// # Errors
    /// [`SyncError::Config`] when `command` is empty.
    pub fn new(command: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SyncError::Config("status command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command to completion and return its stdout.
    ///
    /// The child is killed if the timeout elapses first.
    async fn capture(&self) -> Result<Vec<u8>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                command: self.display_command(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SyncError::Timeout {
                operation: STATUS_OPERATION,
                after: self.timeout,
            })?
            .map_err(|source| SyncError::Spawn {
                command: self.display_command(),
                source,
            })?;

        if !output.status.success() {
            return Err(SyncError::CommandFailed {
                command: self.display_command(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl StatusOracle for CommandStatusOracle {
    async fn poll(&self) -> Result<LivenessSignal> {
        let stdout = self.capture().await?;
        let doc = StatusDocument::parse(&stdout)?;
        debug!(self_field = ?doc.self_field, "status document parsed");
        Ok(doc.liveness())
    }
}
