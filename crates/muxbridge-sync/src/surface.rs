//! The host's terminal-window collaborator.
//!
//! Windows are host-owned and never survive a host restart; this layer
//! only enumerates display names, requests creation, reveals and
//! disposes. Close notifications arrive as a call into
//! [`SessionReconciler::on_terminal_closed`](crate::reconciler::SessionReconciler::on_terminal_closed).

use std::collections::BTreeMap;

/// Request to open one terminal window running `argv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRequest {
    pub name: String,
    pub argv: Vec<String>,
    /// Per-window environment overrides (transport selection for the
    /// attach command).
    pub env: BTreeMap<String, String>,
}

/// Capabilities this layer needs from the host.
pub trait TerminalSurface {
    /// Opaque window handle; identity by host-defined equality.
    type Handle: Clone + PartialEq;

    /// Currently open windows with their display names.
    fn enumerate(&self) -> Vec<(Self::Handle, String)>;

    /// Open a window. Window creation is fire-and-forget on every
    /// host this layer targets, so the call is infallible.
    fn create(&mut self, request: TerminalRequest) -> Self::Handle;

    /// Bring a window to the foreground.
    fn reveal(&mut self, handle: &Self::Handle);

    /// Close a window.
    fn dispose(&mut self, handle: &Self::Handle);
}
