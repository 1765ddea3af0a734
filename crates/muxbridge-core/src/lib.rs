//! muxbridge-core: pure reconciliation logic for mirroring agent CLI
//! sessions into editor terminals. Naming codec, terminal/session
//! registry, and backend arbitration scoring. No IO: the host's window
//! enumeration and the CLI's session list are passed in by the caller.

pub mod arbitration;
pub mod naming;
pub mod registry;
pub mod types;

pub use arbitration::{
    CandidateScore, DetectionCooldown, score_candidate, select_unique_best, wanted_set,
};
pub use naming::{NamingConfig, TerminalIdentity};
pub use registry::{OrphanedTerminal, TerminalRegistry, TrackedTerminal};
pub use types::{SHORT_NAME_RESERVED, SessionInfo, TypeInfo, is_valid_short_name};
