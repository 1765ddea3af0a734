//! Bridge configuration and the host's config-store collaborator.
//!
//! The host owns persistence (editor settings, flags, whatever);
//! this layer only reads a snapshot and writes individual keys with
//! last-write-wins semantics. Change notification flows the other way:
//! the host calls back into the reconciler when settings move.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use muxbridge_core::NamingConfig;
use muxbridge_proto::CliOptions;

/// Transport-selecting socket name relayed to the agent CLI.
pub const ENV_SOCKET: &str = "TMUX_AI_SOCKET";

/// Configuration-directory override relayed to the agent CLI.
pub const ENV_CONFIG_DIR: &str = "TMUX_AI_CONFIG";

/// Transport-selecting temp-directory root relayed to the agent CLI.
pub const ENV_TMP_DIR: &str = "TMUX_TMPDIR";

/// "Treat this transport as authoritative, skip auto-detection" flag.
/// This layer never sets it; the relaxed probe makes sure it is unset.
pub const ENV_BACKEND_FIXED: &str = "TMUX_AI_BACKEND_FIXED";

// ─── Config snapshot ─────────────────────────────────────────────────

/// One snapshot of the bridge's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Path to the agent CLI executable; `None` disables everything
    /// except passive "not configured" messaging.
    pub cli_path: Option<PathBuf>,
    /// Pinned socket name (`TMUX_AI_SOCKET`).
    pub socket: Option<String>,
    /// Pinned CLI config directory (`TMUX_AI_CONFIG`).
    pub config_dir: Option<String>,
    /// Pinned temp-directory root (`TMUX_TMPDIR`).
    pub tmux_tmp_dir: Option<String>,
    /// Whether empty-list-with-orphans triggers backend detection.
    pub auto_detect_backend: bool,
    /// Extra directories scanned during backend discovery.
    pub discovery_search_paths: Vec<String>,
    /// Workspace roots contributed by the host; each adds a
    /// `.tmux-tmp` fallback directory to discovery.
    pub workspace_roots: Vec<PathBuf>,
    /// Terminal title templates.
    pub naming: NamingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cli_path: None,
            socket: None,
            config_dir: None,
            tmux_tmp_dir: None,
            auto_detect_backend: true,
            discovery_search_paths: Vec::new(),
            workspace_roots: Vec::new(),
            naming: NamingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Whether the user pinned a specific transport.
    pub fn has_transport_override(&self) -> bool {
        self.socket.is_some() || self.tmux_tmp_dir.is_some()
    }

    /// Environment relayed to the agent CLI subprocess. Absent keys
    /// mean "let the tool pick its own default".
    pub fn env_overrides(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if let Some(socket) = &self.socket {
            env.insert(ENV_SOCKET.to_owned(), socket.clone());
        }
        if let Some(config_dir) = &self.config_dir {
            env.insert(ENV_CONFIG_DIR.to_owned(), config_dir.clone());
        }
        if let Some(tmp_dir) = &self.tmux_tmp_dir {
            env.insert(ENV_TMP_DIR.to_owned(), tmp_dir.clone());
        }
        env
    }

    /// Environment with every transport pin removed: the relaxed
    /// probe used to test whether a stale pin is hiding sessions.
    pub fn relaxed_env_overrides(&self) -> BTreeMap<String, String> {
        let mut env = self.env_overrides();
        env.remove(ENV_SOCKET);
        env.remove(ENV_TMP_DIR);
        env.remove(ENV_BACKEND_FIXED);
        env
    }

    /// Connection parameters for the protocol client under this
    /// configuration.
    pub fn client_options(&self, cli_path: &Path) -> CliOptions {
        CliOptions::new(cli_path).with_env(self.env_overrides())
    }
}

// ─── Config store collaborator ───────────────────────────────────────

/// Narrow interface over the host's settings store. Last-write-wins;
/// `None` clears a key.
pub trait ConfigStore {
    fn load(&self) -> BridgeConfig;
    fn update_cli_path(&mut self, value: Option<PathBuf>);
    fn update_socket(&mut self, value: Option<String>);
    fn update_tmux_tmp_dir(&mut self, value: Option<String>);
}

/// In-memory store: the default for hosts without persistent settings
/// and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    config: BridgeConfig,
}

impl MemoryConfigStore {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> BridgeConfig {
        self.config.clone()
    }

    fn update_cli_path(&mut self, value: Option<PathBuf>) {
        self.config.cli_path = value;
    }

    fn update_socket(&mut self, value: Option<String>) {
        self.config.socket = value;
    }

    fn update_tmux_tmp_dir(&mut self, value: Option<String>) {
        self.config.tmux_tmp_dir = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. env override assembly ────────────────────────────────────

    #[test]
    fn env_overrides_only_carry_set_keys() {
        let config = BridgeConfig {
            socket: Some("ai".to_owned()),
            ..BridgeConfig::default()
        };
        let env = config.env_overrides();
        assert_eq!(env.get(ENV_SOCKET).map(String::as_str), Some("ai"));
        assert!(!env.contains_key(ENV_CONFIG_DIR));
        assert!(!env.contains_key(ENV_TMP_DIR));
    }

    #[test]
    fn relaxed_overrides_drop_transport_pins() {
        let config = BridgeConfig {
            socket: Some("ai".to_owned()),
            config_dir: Some("/home/dev/.config/tmux-ai".to_owned()),
            tmux_tmp_dir: Some("/var/tmux".to_owned()),
            ..BridgeConfig::default()
        };
        let env = config.relaxed_env_overrides();
        assert!(!env.contains_key(ENV_SOCKET));
        assert!(!env.contains_key(ENV_TMP_DIR));
        // The config dir is not a transport pin and survives.
        assert!(env.contains_key(ENV_CONFIG_DIR));
    }

    // ── 2. transport override detection ─────────────────────────────

    #[test]
    fn transport_override_flags() {
        assert!(!BridgeConfig::default().has_transport_override());
        let pinned = BridgeConfig {
            tmux_tmp_dir: Some("/var/tmux".to_owned()),
            ..BridgeConfig::default()
        };
        assert!(pinned.has_transport_override());
    }

    // ── 3. memory store semantics ───────────────────────────────────

    #[test]
    fn memory_store_is_last_write_wins() {
        let mut store = MemoryConfigStore::default();
        store.update_socket(Some("a".to_owned()));
        store.update_socket(Some("b".to_owned()));
        assert_eq!(store.load().socket.as_deref(), Some("b"));
        store.update_socket(None);
        assert_eq!(store.load().socket, None);
    }
}
