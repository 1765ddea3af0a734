//! Shared data model: sessions and the type catalog as reported by the
//! agent CLI, plus short-name validation.

use serde::{Deserialize, Serialize};

/// Short name reserved by the agent CLI for its own coordination
/// session. Never accepted from or offered to the user.
pub const SHORT_NAME_RESERVED: &str = "master";

/// A short name is non-empty `[A-Za-z0-9_-]+`.
pub fn is_valid_short_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

// ─── Session ─────────────────────────────────────────────────────────

/// One live session from the `list` verb.
///
/// Transient: the session set is fully replaced on every reload, never
/// patched incrementally. `short_name` is unique within one response.
/// Timestamps are carried as opaque strings straight off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub name: String,
    pub short_name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    pub tmux_session: String,
    pub attached_clients: u32,
    pub created: String,
    pub last_used: String,
    pub window_name: String,
}

// ─── Type catalog ────────────────────────────────────────────────────

/// Presentation metadata for one session type, keyed by type id in the
/// `list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub label: String,
    pub icon: String,
    pub base_color: String,
    pub desc: String,
}
