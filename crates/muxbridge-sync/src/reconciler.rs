//! The reload/rehydrate state machine.
//!
//! One reconciler owns the client factory, the terminal registry, the
//! last `list` payload and the degraded flag. `list` results are
//! applied under a monotonically increasing generation ticket so a
//! slow, older reload can never overwrite state built from a newer
//! one. Queries stay valid mid-reload; they answer from the previous
//! snapshot until the new result is applied.

use std::sync::Arc;

use chrono::Utc;
use muxbridge_core::{DetectionCooldown, TerminalRegistry, wanted_set};
use muxbridge_proto::{CliClient, CliError, ExecFailure, ListOk};

use crate::autodetect::{self, DetectionOutcome};
use crate::config::{BridgeConfig, ConfigStore};
use crate::factory::ClientFactory;
use crate::surface::TerminalSurface;

const DEGRADED_HINT_PROTOCOL: &str =
    "Agent CLI protocol version is incompatible; update the agent CLI and reload.";
const DEGRADED_HINT_NOT_JSON: &str =
    "Agent CLI did not return JSON; the configured executable may be an older CLI or a different tool entirely.";

/// Generation token for one reload attempt. Results applied under a
/// ticket that is no longer current are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
}

pub struct SessionReconciler<S: TerminalSurface> {
    factory: ClientFactory,
    registry: TerminalRegistry<S::Handle>,
    list_cache: Option<ListOk>,
    last_error: Option<CliError>,
    degraded_hint: Option<String>,
    generation: u64,
    cooldown: DetectionCooldown,
}

impl<S: TerminalSurface> Default for SessionReconciler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TerminalSurface> SessionReconciler<S> {
    pub fn new() -> Self {
        Self {
            factory: ClientFactory::new(),
            registry: TerminalRegistry::new(),
            list_cache: None,
            last_error: None,
            degraded_hint: None,
            generation: 0,
            cooldown: DetectionCooldown::default(),
        }
    }

    // ─── Reload protocol ─────────────────────────────────────────────

    /// Start a reload attempt. Any ticket handed out earlier becomes
    /// stale.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        ReloadTicket {
            generation: self.generation,
        }
    }

    /// Apply a `list` result gathered under `ticket`. Returns `false`
    /// (leaving all state untouched) when the ticket is stale.
    pub fn apply_reload(
        &mut self,
        ticket: ReloadTicket,
        result: Result<ListOk, CliError>,
        surface: &S,
        config: &BridgeConfig,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                stale = ticket.generation,
                current = self.generation,
                "dropping stale reload result"
            );
            return false;
        }

        match result {
            Ok(list) => {
                self.registry
                    .rehydrate(&list.sessions, &surface.enumerate(), &config.naming);
                self.list_cache = Some(list);
                self.last_error = None;
                self.degraded_hint = None;
            }
            Err(error) => {
                self.list_cache = None;
                self.degraded_hint = degraded_hint_for(&error).map(str::to_owned);
                if self.degraded_hint.is_some() {
                    tracing::warn!(%error, "entering degraded mode");
                }
                self.last_error = Some(error);
            }
        }
        true
    }

    /// Full reload: `list` with the configured transport, rehydrate,
    /// then backend auto-detection when the result looks like a
    /// transport mismatch. A detection that changes configuration is
    /// followed by exactly one more reload.
    pub async fn reload(
        &mut self,
        surface: &S,
        store: &mut dyn ConfigStore,
    ) -> Result<(), CliError> {
        let config_changed = self.reload_once(surface, store).await?;
        if config_changed {
            self.reload_once(surface, store).await?;
        }
        Ok(())
    }

    async fn reload_once(
        &mut self,
        surface: &S,
        store: &mut dyn ConfigStore,
    ) -> Result<bool, CliError> {
        let config = store.load();
        let Some(cli_path) = config.cli_path.clone() else {
            self.list_cache = None;
            self.last_error = None;
            self.degraded_hint = None;
            return Ok(false);
        };

        let ticket = self.begin_reload();
        let client = self.factory.client(config.client_options(&cli_path));
        let result = client.list().await;
        let error = result.as_ref().err().cloned();
        let applied = self.apply_reload(ticket, result, surface, &config);
        if let Some(error) = error {
            return Err(error);
        }
        if !applied {
            return Ok(false);
        }

        // Zero sessions while orphaned windows exist: the sessions
        // likely live on another transport.
        let empty = self
            .list_cache
            .as_ref()
            .is_some_and(|list| list.sessions.is_empty());
        let orphaned = self.registry.get_orphaned();
        if !(config.auto_detect_backend && empty && !orphaned.is_empty()) {
            return Ok(false);
        }
        if !self.cooldown.try_begin(Utc::now()) {
            tracing::debug!("backend detection on cooldown");
            return Ok(false);
        }

        let wanted = wanted_set(orphaned.iter().map(|o| o.short_name.as_str()));
        let outcome =
            autodetect::run(&mut self.factory, store, &config, &cli_path, &wanted).await;
        Ok(matches!(
            outcome,
            DetectionOutcome::Promoted(_) | DetectionOutcome::ClearedOverrides
        ))
    }

    /// A host window closed: re-partition against the last known
    /// session set without touching the agent CLI.
    pub fn on_terminal_closed(&mut self, surface: &S, config: &BridgeConfig) {
        let Some(list) = &self.list_cache else {
            return;
        };
        let sessions = list.sessions.clone();
        self.registry
            .rehydrate(&sessions, &surface.enumerate(), &config.naming);
    }

    /// Settings moved: forget the cached client and the detection
    /// cooldown so the next reload starts clean.
    pub fn on_config_changed(&mut self) {
        self.factory.invalidate();
        self.cooldown.reset();
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn is_degraded(&self) -> bool {
        self.degraded_hint.is_some()
    }

    pub fn degraded_hint(&self) -> Option<&str> {
        self.degraded_hint.as_deref()
    }

    pub fn latest_list(&self) -> Option<&ListOk> {
        self.list_cache.as_ref()
    }

    pub fn last_error(&self) -> Option<&CliError> {
        self.last_error.as_ref()
    }

    pub fn registry(&self) -> &TerminalRegistry<S::Handle> {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut TerminalRegistry<S::Handle> {
        &mut self.registry
    }

    pub(crate) fn client_for(&mut self, config: &BridgeConfig) -> Option<Arc<CliClient>> {
        let cli_path = config.cli_path.as_ref()?;
        Some(self.factory.client(config.client_options(cli_path)))
    }
}

/// Which failures push the bridge into degraded mode. Matched
/// exhaustively so a new error kind forces a decision here.
fn degraded_hint_for(error: &CliError) -> Option<&'static str> {
    match error {
        CliError::Protocol { .. } => Some(DEGRADED_HINT_PROTOCOL),
        CliError::Exec {
            detail: ExecFailure::NotJson { .. },
            ..
        } => Some(DEGRADED_HINT_NOT_JSON),
        CliError::Exec { .. } | CliError::Response { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxbridge_core::SessionInfo;
    use muxbridge_proto::ExecFailure;

    use crate::surface::TerminalRequest;

    // ── Helpers ──────────────────────────────────────────────────────

    struct StaticSurface {
        windows: Vec<(u32, String)>,
    }

    impl TerminalSurface for StaticSurface {
        type Handle = u32;

        fn enumerate(&self) -> Vec<(u32, String)> {
            self.windows.clone()
        }

        fn create(&mut self, _request: TerminalRequest) -> u32 {
            unreachable!("reload never creates windows")
        }

        fn reveal(&mut self, _handle: &u32) {}

        fn dispose(&mut self, _handle: &u32) {}
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

    fn list_ok(sessions: Vec<SessionInfo>) -> ListOk {
        ListOk {
            types: Default::default(),
            sessions,
            now: "t".to_owned(),
        }
    }

    fn surface(windows: &[(u32, &str)]) -> StaticSurface {
        StaticSurface {
            windows: windows
                .iter()
                .map(|(id, name)| (*id, (*name).to_owned()))
                .collect(),
        }
    }

    // ── 1. apply rehydrates the partition ───────────────────────────

    #[test]
    fn apply_tracks_matching_windows() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[(10, "AI: bob"), (11, "zsh")]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        assert!(reconciler.apply_reload(ticket, Ok(list_ok(vec![session("bob")])), &surface, &config));

        assert_eq!(reconciler.registry().get_primary("bob"), Some(&10));
        assert!(reconciler.registry().get_orphaned().is_empty());
        assert!(!reconciler.is_degraded());
    }

    #[test]
    fn empty_session_set_orphans_named_windows() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[(10, "AI: bob")]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(ticket, Ok(list_ok(vec![])), &surface, &config);

        assert!(reconciler.registry().get_primary("bob").is_none());
        let orphaned = reconciler.registry().get_orphaned();
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].short_name, "bob");
    }

    // ── 2. stale tickets are dropped ────────────────────────────────

    #[test]
    fn stale_result_never_overwrites_newer_one() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[(10, "AI: bob")]);
        let config = BridgeConfig::default();

        let older = reconciler.begin_reload();
        let newer = reconciler.begin_reload();

        assert!(reconciler.apply_reload(newer, Ok(list_ok(vec![session("bob")])), &surface, &config));
        // The older list (without bob) finishes late; it must not win.
        assert!(!reconciler.apply_reload(older, Ok(list_ok(vec![])), &surface, &config));

        assert_eq!(reconciler.registry().get_primary("bob"), Some(&10));
        assert_eq!(
            reconciler.latest_list().map(|l| l.sessions.len()),
            Some(1)
        );
    }

    // ── 3. degraded classification ──────────────────────────────────

    #[test]
    fn protocol_error_degrades() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Err(CliError::Protocol {
                expected: 1,
                actual: "2".to_owned(),
            }),
            &surface,
            &config,
        );

        assert!(reconciler.is_degraded());
        assert!(reconciler.degraded_hint().is_some());
        assert!(reconciler.latest_list().is_none());
    }

    #[test]
    fn not_json_exec_error_degrades() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Err(CliError::Exec {
                detail: ExecFailure::NotJson {
                    stdout_head: "usage".to_owned(),
                },
                exit_code: Some(2),
                stderr: String::new(),
            }),
            &surface,
            &config,
        );

        assert!(reconciler.is_degraded());
    }

    #[test]
    fn response_error_does_not_degrade() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Err(CliError::Response {
                code: "E_BUSY".to_owned(),
                message: "busy".to_owned(),
                hint: None,
                protocol_version: 1,
            }),
            &surface,
            &config,
        );

        assert!(!reconciler.is_degraded());
        assert!(reconciler.last_error().is_some());
    }

    #[test]
    fn successful_reload_clears_degraded() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let surface = surface(&[]);
        let config = BridgeConfig::default();

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(
            ticket,
            Err(CliError::Protocol {
                expected: 1,
                actual: "0".to_owned(),
            }),
            &surface,
            &config,
        );
        assert!(reconciler.is_degraded());

        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(ticket, Ok(list_ok(vec![])), &surface, &config);
        assert!(!reconciler.is_degraded());
        assert!(reconciler.last_error().is_none());
    }

    // ── 4. terminal-close rehydration ───────────────────────────────

    #[test]
    fn close_notification_repartitions_from_cache() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let config = BridgeConfig::default();

        let before = surface(&[(10, "AI: bob"), (20, "AI: bob (2)")]);
        let ticket = reconciler.begin_reload();
        reconciler.apply_reload(ticket, Ok(list_ok(vec![session("bob")])), &before, &config);
        assert_eq!(reconciler.registry().get_next_client_index("bob"), 3);

        // The secondary window closed.
        let after = surface(&[(10, "AI: bob")]);
        reconciler.on_terminal_closed(&after, &config);
        assert_eq!(reconciler.registry().get_next_client_index("bob"), 2);
        assert_eq!(reconciler.registry().get_primary("bob"), Some(&10));
    }

    #[test]
    fn close_notification_before_first_reload_is_noop() {
        let mut reconciler: SessionReconciler<StaticSurface> = SessionReconciler::new();
        let config = BridgeConfig::default();
        let surface = surface(&[(10, "AI: bob")]);

        reconciler.on_terminal_closed(&surface, &config);
        assert!(reconciler.registry().get_orphaned().is_empty());
    }
}
