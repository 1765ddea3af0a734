//! muxbridge-sync: the stateful reconciliation layer.
//! Ties the protocol client, backend discovery and the pure
//! reconciliation core together behind two narrow host traits
//! (terminal surface, config store): reload with generation guarding,
//! degraded-mode classification, backend auto-detection, and the
//! session command set.

pub mod autodetect;
pub mod commands;
pub mod config;
pub mod factory;
pub mod reconciler;
pub mod surface;

pub use autodetect::DetectionOutcome;
pub use commands::{
    CommandError, ConnectOutcome, RenameOutcome, SessionTerminals, validate_short_name,
};
pub use config::{
    BridgeConfig, ConfigStore, ENV_BACKEND_FIXED, ENV_CONFIG_DIR, ENV_SOCKET, ENV_TMP_DIR,
    MemoryConfigStore,
};
pub use factory::ClientFactory;
pub use reconciler::{ReloadTicket, SessionReconciler};
pub use surface::{TerminalRequest, TerminalSurface};
