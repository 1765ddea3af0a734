//! Error taxonomy for agent CLI calls.
//!
//! Exactly three kinds, matched exhaustively by callers:
//! `Protocol` (incompatible tool, not retryable), `Response` (the tool
//! ran and rejected the request), `Exec` (no decodable response at
//! all). Errors are `Clone` so a coalesced `list` can hand the same
//! failure to every waiter.

use std::fmt;

use thiserror::Error;

/// How an invocation failed before yielding a usable protocol response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecFailure {
    /// The executable could not be spawned.
    Spawn(String),
    /// The subprocess outlived the call timeout and was killed.
    Timeout,
    /// Stdout exceeded the output cap.
    OutputTooLarge { limit_bytes: usize },
    /// Stdout was not valid JSON.
    NotJson { stdout_head: String },
    /// Stdout was valid versioned JSON but the payload did not match
    /// the verb's contract.
    Shape(String),
}

impl fmt::Display for ExecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(detail) => write!(f, "failed to spawn agent CLI: {detail}"),
            Self::Timeout => write!(f, "agent CLI timed out"),
            Self::OutputTooLarge { limit_bytes } => {
                write!(f, "agent CLI stdout exceeded {limit_bytes} bytes")
            }
            Self::NotJson { stdout_head } => write!(
                f,
                "agent CLI did not return valid JSON on stdout (first 200 chars): {stdout_head}"
            ),
            Self::Shape(detail) => write!(f, "agent CLI response payload mismatch: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    /// The tool speaks a different protocol version. Fatal to the
    /// call and non-retryable: the tool must be updated or replaced.
    #[error("agent CLI protocolVersion mismatch: expected={expected}, actual={actual}")]
    Protocol { expected: u32, actual: String },

    /// The tool executed the request and rejected it at the
    /// application level. `code`, `message` and `hint` are surfaced
    /// verbatim.
    #[error("{message} ({code})")]
    Response {
        code: String,
        message: String,
        hint: Option<String>,
        protocol_version: u32,
    },

    /// The tool produced no decodable response: wrong executable,
    /// crashed process, or a pre-protocol version.
    #[error("{detail}")]
    Exec {
        detail: ExecFailure,
        exit_code: Option<i32>,
        stderr: String,
    },
}
