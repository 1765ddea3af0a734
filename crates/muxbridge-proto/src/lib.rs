//! muxbridge-proto: subprocess IO boundary for the agent CLI.
//! One invocation per verb over the versioned `--json` contract, with a
//! closed three-variant error taxonomy and request coalescing for
//! `list`. No reconciliation logic, pure protocol plumbing.

pub mod client;
pub mod error;
pub mod protocol;

pub use client::{CliClient, CliOptions, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
pub use error::{CliError, ExecFailure};
pub use protocol::{AttachOk, EXPECTED_PROTOCOL_VERSION, ListOk, NewOk, OkSimple, RenameOk};
