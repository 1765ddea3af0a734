//! Session commands: the per-session operations the editor exposes,
//! minus the dialogs. Decisions a human would make (close stale
//! windows? reopen?) are returned to the caller as data.
//!
//! Every mutating command is blocked while degraded: the agent CLI is
//! incompatible and individual calls would only fail with worse
//! messages. Passive queries stay available.

use muxbridge_core::{
    NamingConfig, SHORT_NAME_RESERVED, is_valid_short_name,
    naming::{format_multi_client, format_primary},
};
use muxbridge_proto::CliError;
use thiserror::Error;

use crate::config::{BridgeConfig, ConfigStore};
use crate::reconciler::SessionReconciler;
use crate::surface::{TerminalRequest, TerminalSurface};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("agent CLI incompatible (degraded mode): {hint}")]
    Degraded { hint: String },

    #[error("invalid short name: {0:?} (only [A-Za-z0-9_-]+ is allowed)")]
    InvalidShortName(String),

    #[error("'{SHORT_NAME_RESERVED}' is reserved")]
    ReservedShortName,

    #[error("no agent CLI executable configured")]
    MissingCliPath,

    #[error("agent CLI returned an empty argv for attach")]
    EmptyArgv,

    #[error(transparent)]
    Cli(#[from] CliError),
}

/// Reject names the CLI would refuse: bad charset or the reserved name.
pub fn validate_short_name(name: &str) -> Result<(), CommandError> {
    if name == SHORT_NAME_RESERVED {
        return Err(CommandError::ReservedShortName);
    }
    if !is_valid_short_name(name) {
        return Err(CommandError::InvalidShortName(name.to_owned()));
    }
    Ok(())
}

/// How `connect` satisfied the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome<H> {
    /// An existing primary window was brought forward.
    Revealed(H),
    /// A new primary window was created from the attach argv.
    Created(H),
}

/// Windows still carrying the old name after a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome<H> {
    pub stale_terminals: Vec<H>,
}

/// Windows still open for a session after `kill` / `detach-all`;
/// the caller decides whether to dispose them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTerminals<H> {
    pub remaining: Vec<H>,
}

impl<S: TerminalSurface> SessionReconciler<S> {
    /// Open (or reveal) the primary terminal for a session.
    pub async fn connect(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        short_name: &str,
    ) -> Result<ConnectOutcome<S::Handle>, CommandError> {
        self.ensure_ready(short_name)?;
        let config = store.load();

        if let Some(handle) = self.registry().get_primary(short_name).cloned() {
            surface.reveal(&handle);
            return Ok(ConnectOutcome::Revealed(handle));
        }
        // The registry is rebuilt per reload; a window created since
        // (or before the first reload) may only be visible by name.
        if let Some(handle) = find_primary_window(surface, &config.naming, short_name) {
            surface.reveal(&handle);
            return Ok(ConnectOutcome::Revealed(handle));
        }

        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        let attach = client.attach(short_name).await?;
        if attach.argv.is_empty() {
            return Err(CommandError::EmptyArgv);
        }

        let name = format_primary(&config.naming.primary_format, short_name);
        let handle = surface.create(TerminalRequest {
            name,
            argv: attach.argv,
            env: config.env_overrides(),
        });
        self.registry_mut()
            .track_session_terminal(short_name, 1, handle.clone());
        surface.reveal(&handle);
        Ok(ConnectOutcome::Created(handle))
    }

    /// Open an additional client window for a session.
    pub async fn open_new_client(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        short_name: &str,
    ) -> Result<S::Handle, CommandError> {
        self.ensure_ready(short_name)?;
        let config = store.load();
        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        let attach = client.attach(short_name).await?;
        if attach.argv.is_empty() {
            return Err(CommandError::EmptyArgv);
        }

        let client_index = self.registry().get_next_client_index(short_name);
        let name = format_multi_client(
            &config.naming.multi_client_format,
            short_name,
            client_index,
        );
        let handle = surface.create(TerminalRequest {
            name,
            argv: attach.argv,
            env: config.env_overrides(),
        });
        self.registry_mut()
            .track_session_terminal(short_name, client_index, handle.clone());
        surface.reveal(&handle);
        Ok(handle)
    }

    /// Create a session and connect to it.
    pub async fn create_session(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        type_id: &str,
        short_name: Option<&str>,
    ) -> Result<ConnectOutcome<S::Handle>, CommandError> {
        self.ensure_not_degraded()?;
        if let Some(name) = short_name {
            validate_short_name(name)?;
        }
        let config = store.load();
        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        let created = client.new_session(type_id, short_name).await?;
        self.reload(surface, store).await?;
        self.connect(surface, store, &created.session.short_name)
            .await
    }

    /// Rename a session. Windows keep their titles, so the ones still
    /// named after `old` come back for the caller to close or reopen.
    pub async fn rename(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        old: &str,
        new: &str,
    ) -> Result<RenameOutcome<S::Handle>, CommandError> {
        self.ensure_ready(old)?;
        validate_short_name(new)?;
        if new == old {
            return Ok(RenameOutcome {
                stale_terminals: Vec::new(),
            });
        }

        let config = store.load();
        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        client.rename(old, new).await?;
        self.reload(surface, store).await?;

        let stale_terminals = windows_for(surface, &config.naming, old)
            .into_iter()
            .map(|(handle, _)| handle)
            .collect();
        Ok(RenameOutcome { stale_terminals })
    }

    /// Kill a session; its windows survive as orphans until disposed.
    pub async fn kill(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        short_name: &str,
    ) -> Result<SessionTerminals<S::Handle>, CommandError> {
        self.ensure_ready(short_name)?;
        let config = store.load();
        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        client.kill(short_name).await?;
        self.reload(surface, store).await?;

        let remaining = windows_for(surface, &config.naming, short_name)
            .into_iter()
            .map(|(handle, _)| handle)
            .collect();
        Ok(SessionTerminals { remaining })
    }

    /// Detach every client from a session.
    pub async fn detach_all(
        &mut self,
        surface: &mut S,
        store: &mut dyn ConfigStore,
        short_name: &str,
    ) -> Result<SessionTerminals<S::Handle>, CommandError> {
        self.ensure_ready(short_name)?;
        let config = store.load();
        let client = self.client_for(&config).ok_or(CommandError::MissingCliPath)?;
        client.detach_all(short_name).await?;
        self.reload(surface, store).await?;

        let remaining = windows_for(surface, &config.naming, short_name)
            .into_iter()
            .map(|(handle, _)| handle)
            .collect();
        Ok(SessionTerminals { remaining })
    }

    /// Dispose every orphaned window and re-partition. Returns how
    /// many were closed.
    pub fn close_orphaned_terminals(&mut self, surface: &mut S, config: &BridgeConfig) -> usize {
        let orphaned = self.registry().get_orphaned();
        for orphan in &orphaned {
            surface.dispose(&orphan.handle);
        }
        self.on_terminal_closed(surface, config);
        orphaned.len()
    }

    fn ensure_not_degraded(&self) -> Result<(), CommandError> {
        match self.degraded_hint() {
            Some(hint) => Err(CommandError::Degraded {
                hint: hint.to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn ensure_ready(&self, short_name: &str) -> Result<(), CommandError> {
        self.ensure_not_degraded()?;
        validate_short_name(short_name)
    }
}

/// Current windows whose parsed identity belongs to `short_name`.
fn windows_for<S: TerminalSurface>(
    surface: &S,
    naming: &NamingConfig,
    short_name: &str,
) -> Vec<(S::Handle, u32)> {
    let mut windows = Vec::new();
    for (handle, name) in surface.enumerate() {
        let Some(identity) = naming.parse(&name) else {
            continue;
        };
        if identity.short_name == short_name {
            windows.push((handle, identity.client_index));
        }
    }
    windows
}

fn find_primary_window<S: TerminalSurface>(
    surface: &S,
    naming: &NamingConfig,
    short_name: &str,
) -> Option<S::Handle> {
    windows_for(surface, naming, short_name)
        .into_iter()
        .find(|&(_, client_index)| client_index == 1)
        .map(|(handle, _)| handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxbridge_core::SessionInfo;
    use muxbridge_proto::{CliError, ListOk};

    use crate::config::MemoryConfigStore;

    // ── Helpers ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingSurface {
        windows: Vec<(u32, String)>,
        next_id: u32,
        revealed: Vec<u32>,
        disposed: Vec<u32>,
    }

    impl RecordingSurface {
        fn with_windows(windows: &[(u32, &str)]) -> Self {
            Self {
                windows: windows
                    .iter()
                    .map(|(id, name)| (*id, (*name).to_owned()))
                    .collect(),
                next_id: 100,
                ..Self::default()
            }
        }
    }

    impl TerminalSurface for RecordingSurface {
        type Handle = u32;

        fn enumerate(&self) -> Vec<(u32, String)> {
            self.windows.clone()
        }

        fn create(&mut self, request: TerminalRequest) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            self.windows.push((id, request.name));
            id
        }

        fn reveal(&mut self, handle: &u32) {
            self.revealed.push(*handle);
        }

        fn dispose(&mut self, handle: &u32) {
            self.disposed.push(*handle);
            self.windows.retain(|(id, _)| id != handle);
        }
    }

    fn session(short_name: &str) -> SessionInfo {
        SessionInfo {
            name: format!("ai-{short_name}"),
            short_name: short_name.to_owned(),
            type_id: "claude".to_owned(),
            tmux_session: format!("ai-{short_name}"),
            attached_clients: 0,
            created: "t0".to_owned(),
            last_used: "t1".to_owned(),
            window_name: "main".to_owned(),
        }
    }

    fn reconciler_with(
        sessions: Vec<SessionInfo>,
        surface: &RecordingSurface,
    ) -> SessionReconciler<RecordingSurface> {
        let mut reconciler = SessionReconciler::new();
        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Ok(ListOk {
                types: Default::default(),
                sessions,
                now: "t".to_owned(),
            }),
            surface,
            &BridgeConfig::default(),
        );
        reconciler
    }

    fn degraded_reconciler(surface: &RecordingSurface) -> SessionReconciler<RecordingSurface> {
        let mut reconciler = SessionReconciler::new();
        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Err(CliError::Protocol {
                expected: 1,
                actual: "2".to_owned(),
            }),
            surface,
            &BridgeConfig::default(),
        );
        reconciler
    }

    // ── 1. validation ───────────────────────────────────────────────

    #[test]
    fn reserved_and_malformed_names_rejected() {
        assert_eq!(
            validate_short_name("master"),
            Err(CommandError::ReservedShortName)
        );
        assert!(matches!(
            validate_short_name("has space"),
            Err(CommandError::InvalidShortName(_))
        ));
        assert_eq!(validate_short_name("claude-7"), Ok(()));
    }

    // ── 2. degraded mode blocks mutating commands ───────────────────

    #[tokio::test]
    async fn degraded_blocks_connect() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = degraded_reconciler(&surface);
        let mut store = MemoryConfigStore::default();

        let err = reconciler
            .connect(&mut surface, &mut store, "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Degraded { .. }));
    }

    #[tokio::test]
    async fn degraded_blocks_kill_and_create() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = degraded_reconciler(&surface);
        let mut store = MemoryConfigStore::default();

        let err = reconciler
            .kill(&mut surface, &mut store, "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Degraded { .. }));

        let err = reconciler
            .create_session(&mut surface, &mut store, "claude", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Degraded { .. }));
    }

    // ── 3. connect reuses a live primary without touching the CLI ───

    #[tokio::test]
    async fn connect_reveals_tracked_primary() {
        let mut surface = RecordingSurface::with_windows(&[(10, "AI: bob")]);
        let mut reconciler = reconciler_with(vec![session("bob")], &surface);
        // No cli_path configured: a CLI round trip would fail loudly.
        let mut store = MemoryConfigStore::default();

        let outcome = reconciler
            .connect(&mut surface, &mut store, "bob")
            .await
            .expect("reuses window");
        assert_eq!(outcome, ConnectOutcome::Revealed(10));
        assert_eq!(surface.revealed, vec![10]);
    }

    #[tokio::test]
    async fn connect_finds_primary_by_name_when_untracked() {
        // Window exists but the registry never saw it (created after
        // the last reload).
        let mut surface = RecordingSurface::with_windows(&[(10, "AI: bob")]);
        let mut reconciler = reconciler_with(vec![session("bob")], &RecordingSurface::default());
        let mut store = MemoryConfigStore::default();

        let outcome = reconciler
            .connect(&mut surface, &mut store, "bob")
            .await
            .expect("found by name");
        assert_eq!(outcome, ConnectOutcome::Revealed(10));
    }

    // ── 4. missing executable surfaces as a command error ───────────

    #[tokio::test]
    async fn connect_without_cli_path_errors() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = reconciler_with(vec![session("bob")], &surface);
        let mut store = MemoryConfigStore::default();

        let err = reconciler
            .connect(&mut surface, &mut store, "bob")
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::MissingCliPath);
    }

    // ── 5. rename no-op short-circuits ──────────────────────────────

    #[tokio::test]
    async fn rename_to_same_name_is_noop() {
        let mut surface = RecordingSurface::default();
        let mut reconciler = reconciler_with(vec![session("bob")], &surface);
        let mut store = MemoryConfigStore::default();

        let outcome = reconciler
            .rename(&mut surface, &mut store, "bob", "bob")
            .await
            .expect("noop");
        assert!(outcome.stale_terminals.is_empty());
    }

    // ── 6. orphan cleanup ───────────────────────────────────────────

    #[test]
    fn close_orphaned_disposes_and_repartitions() {
        let mut surface = RecordingSurface::with_windows(&[(10, "AI: gone"), (11, "AI: bob")]);
        let mut reconciler = reconciler_with(vec![session("bob")], &surface);
        assert_eq!(reconciler.registry().get_orphaned().len(), 1);

        let closed =
            reconciler.close_orphaned_terminals(&mut surface, &BridgeConfig::default());
        assert_eq!(closed, 1);
        assert_eq!(surface.disposed, vec![10]);
        assert!(reconciler.registry().get_orphaned().is_empty());
        assert_eq!(reconciler.registry().get_primary("bob"), Some(&11));
    }
}
