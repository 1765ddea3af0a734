//! Wire contract for the agent CLI's `--json` responses.
//!
//! Every response is a JSON object carrying `protocolVersion` and
//! either `ok: true` plus the verb's payload, or `ok: false` plus
//! `code` / `message` / optional `hint`. The envelope is checked by the
//! client before any payload field is interpreted; the types here model
//! the success payloads only.

use std::collections::BTreeMap;

use muxbridge_core::{SessionInfo, TypeInfo};
use serde::{Deserialize, Serialize};

/// Protocol version this client understands. A response with any other
/// value is rejected before its payload is looked at.
pub const EXPECTED_PROTOCOL_VERSION: u32 = 1;

/// `list` payload: the type catalog, the live session set, and the
/// tool's own clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOk {
    #[serde(default)]
    pub types: BTreeMap<String, TypeInfo>,
    pub sessions: Vec<SessionInfo>,
    pub now: String,
}

/// `new` payload: the created session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOk {
    pub session: SessionInfo,
}

/// `attach` payload: the exact command line the caller must execute to
/// open a terminal attached to the session, plus the refreshed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachOk {
    pub argv: Vec<String>,
    pub session: SessionInfo,
}

/// `rename` payload: the session under its new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOk {
    pub session: SessionInfo,
}

/// Payload for verbs (`kill`, `detach-all`) with no fields beyond the
/// envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkSimple {}
