//! Tracked/orphaned partition of host terminal windows against the
//! live session set.
//!
//! The registry is generic over the host's opaque window handle `H`;
//! the host owns window lifecycle, this core only reads identity from
//! display names and remembers which handle belongs to which session.

use std::collections::HashMap;

use crate::naming::NamingConfig;
use crate::types::SessionInfo;

/// A window tracked against a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTerminal<H> {
    pub handle: H,
    pub client_index: u32,
}

/// A window whose parsed short name matches no live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedTerminal<H> {
    pub handle: H,
    pub name: String,
    pub short_name: String,
    pub client_index: u32,
}

/// Reconciliation state for one reload cycle.
///
/// `rehydrate` is the sole bulk mutator: it replaces the session set
/// and the tracked/orphaned partition atomically from scratch. Windows
/// whose titles don't parse are ignored; parsed windows either join a
/// live session's bucket or the orphan list. For each session the
/// window with `client_index == 1` is the primary; if none carries
/// index 1, the lowest-indexed window is promoted.
#[derive(Debug, Clone)]
pub struct TerminalRegistry<H> {
    live_sessions: HashMap<String, SessionInfo>,
    by_short_name: HashMap<String, Vec<TrackedTerminal<H>>>,
    primary_by_short_name: HashMap<String, H>,
    orphaned: Vec<OrphanedTerminal<H>>,
}

impl<H> Default for TerminalRegistry<H> {
    fn default() -> Self {
        Self {
            live_sessions: HashMap::new(),
            by_short_name: HashMap::new(),
            primary_by_short_name: HashMap::new(),
            orphaned: Vec::new(),
        }
    }
}

impl<H: Clone> TerminalRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole partition from a fresh session list and the
    /// host's current `(handle, display name)` enumeration.
    pub fn rehydrate(
        &mut self,
        sessions: &[SessionInfo],
        windows: &[(H, String)],
        naming: &NamingConfig,
    ) {
        self.live_sessions = sessions
            .iter()
            .map(|s| (s.short_name.clone(), s.clone()))
            .collect();
        self.by_short_name.clear();
        self.primary_by_short_name.clear();
        self.orphaned.clear();

        for (handle, name) in windows {
            let Some(identity) = naming.parse(name) else {
                continue;
            };

            if !self.live_sessions.contains_key(&identity.short_name) {
                self.orphaned.push(OrphanedTerminal {
                    handle: handle.clone(),
                    name: name.clone(),
                    short_name: identity.short_name,
                    client_index: identity.client_index,
                });
                continue;
            }

            self.by_short_name
                .entry(identity.short_name)
                .or_default()
                .push(TrackedTerminal {
                    handle: handle.clone(),
                    client_index: identity.client_index,
                });
        }

        for (short_name, list) in &mut self.by_short_name {
            list.sort_by_key(|t| t.client_index);
            let primary = list.iter().find(|t| t.client_index == 1).or(list.first());
            if let Some(primary) = primary {
                self.primary_by_short_name
                    .insert(short_name.clone(), primary.handle.clone());
            }
        }
    }

    /// The tracked primary window for a session, if any.
    pub fn get_primary(&self, short_name: &str) -> Option<&H> {
        self.primary_by_short_name.get(short_name)
    }

    /// Next free client index for a session: `max(2, highest + 1)`.
    /// Index 1 is reserved for the primary and never handed out here.
    pub fn get_next_client_index(&self, short_name: &str) -> u32 {
        let mut max_k = 1;
        if let Some(list) = self.by_short_name.get(short_name) {
            for t in list {
                if t.client_index > max_k {
                    max_k = t.client_index;
                }
            }
        }
        (max_k + 1).max(2)
    }

    /// Record a freshly created window without waiting for the next
    /// rehydrate, so a just-created primary is discoverable
    /// immediately. No-op if the session is not currently live.
    pub fn track_session_terminal(&mut self, short_name: &str, client_index: u32, handle: H) {
        if !self.live_sessions.contains_key(short_name) {
            return;
        }

        self.by_short_name
            .entry(short_name.to_owned())
            .or_default()
            .push(TrackedTerminal {
                handle: handle.clone(),
                client_index,
            });

        let take_primary =
            client_index == 1 || !self.primary_by_short_name.contains_key(short_name);
        if take_primary {
            self.primary_by_short_name
                .insert(short_name.to_owned(), handle);
        }
    }

    /// Current orphan list (defensive copy).
    pub fn get_orphaned(&self) -> Vec<OrphanedTerminal<H>> {
        self.orphaned.clone()
    }

    pub fn is_session_live(&self, short_name: &str) -> bool {
        self.live_sessions.contains_key(short_name)
    }

    pub fn session(&self, short_name: &str) -> Option<&SessionInfo> {
        self.live_sessions.get(short_name)
    }

    /// Tracked windows for a session, sorted by client index.
    pub fn terminals_for(&self, short_name: &str) -> &[TrackedTerminal<H>] {
        self.by_short_name
            .get(short_name)
            .map_or(&[][..], |list| list.as_slice())
    }
}
