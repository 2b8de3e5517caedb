//! Error types for transports and command execution.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while binding a transport to a node.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("error spawning {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error connecting to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("authentication failed for {addr}: {reason}")]
    Auth { addr: String, reason: String },

    #[error("timed out after {timeout:?} switching to {addr}")]
    Timeout { addr: String, timeout: Duration },
}

/// Result type alias for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised while running a command on the bound node.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no transport configured")]
    NoTransport,

    #[error("error running {command:?}: {source}")]
    Transport {
        command: String,
        #[source]
        source: TransportError,
    },

    #[error("command {command:?} exited with {} (stderr={stderr:?} stdout={stdout:?})", exit_code_text(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
