//! Crate-level error type.
//!
//! Every fallible operation in the status oracle, the control client and the
//! configuration layer returns [`SyncError`]. None of them are fatal to the
//! reconciliation loop; the loop logs them and carries on at the next tick.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while polling status, talking to the routing daemon, or
/// loading configuration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The status command could not be started (missing binary, permissions).
    #[error("failed to spawn status command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The status command ran but exited unsuccessfully.
    #[error("status command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// An external call did not finish within its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The status output was not a JSON object.
    #[error("status output is not a JSON object: {0}")]
    Parse(#[from] serde_json::Error),

    /// The control socket could not be reached.
    #[error("cannot connect to control socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on an established control session.
    #[error("control channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon sent something that is not a valid reply line.
    #[error("malformed control reply: {0}")]
    Protocol(String),

    /// The daemon answered the command with an error code.
    #[error("daemon rejected command with {code}: {message}")]
    Rejected { code: u16, message: String },

    /// The daemon has no protocol by that name.
    #[error("daemon has no protocol named `{0}`")]
    UnknownProtocol(String),

    /// The configured protocol name cannot be sent safely.
    #[error("invalid protocol name `{0}`")]
    InvalidProtocolName(String),

    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Control calls failed too many times in a row.
    #[error("{count} consecutive control failures, last: {last}")]
    ControlFailuresExceeded { count: u32, last: Box<SyncError> },
}

impl SyncError {
    /// True for failures of the status oracle (execution or parse). The loop
    /// maps these to a "not primary" signal.
    pub fn is_status_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Spawn { .. }
                | SyncError::CommandFailed { .. }
                | SyncError::Parse(_)
                | SyncError::Timeout {
                    operation: crate::status::STATUS_OPERATION,
                    ..
                }
        )
    }

    /// True for failures reaching or commanding the routing daemon.
    pub fn is_control_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Connect { .. }
                | SyncError::Io(_)
                | SyncError::Protocol(_)
                | SyncError::Rejected { .. }
                | SyncError::UnknownProtocol(_)
                | SyncError::InvalidProtocolName(_)
                | SyncError::Timeout {
                    operation: crate::control::CONTROL_OPERATION,
                    ..
                }
        )
    }

    /// Short failure class for log fields: `status`, `control`, or `other`.
    pub fn kind(&self) -> &'static str {
        if self.is_status_failure() {
            "status"
        } else if self.is_control_failure() {
            "control"
        } else {
            "other"
        }
    }
}
