//! Shared helpers for the subcommands: client construction, list
//! summaries, and error rendering.

use anyhow::Context;
use muxbridge_proto::{CliClient, CliError, ListOk};
use muxbridge_sync::BridgeConfig;

/// Build a client for the configured executable, or fail with a hint.
pub fn client_for(config: &BridgeConfig) -> anyhow::Result<CliClient> {
    let cli_path = config
        .cli_path
        .as_ref()
        .context("no agent CLI executable configured (use --cli-path or MUXBRIDGE_CLI)")?;
    Ok(CliClient::new(config.client_options(cli_path)))
}

/// One-line session summary, `N session(s): a, b, …(+K)`.
pub fn list_summary(list: &ListOk) -> String {
    let mut short_names: Vec<&str> = list
        .sessions
        .iter()
        .map(|s| s.short_name.as_str())
        .collect();
    short_names.sort_unstable();

    let total = short_names.len();
    let head = short_names[..total.min(12)].join(", ");
    let tail = if total > 12 {
        format!(", …(+{})", total - 12)
    } else {
        String::new()
    };
    format!("{total} session(s): {head}{tail}")
}

/// Render a CLI error the way the editor surfaces it: the message,
/// plus stderr for execution failures and the hint when the tool
/// offered one.
pub fn render_error(error: &CliError) -> String {
    match error {
        CliError::Exec { stderr, .. } if !stderr.is_empty() => {
            format!("{error}\nstderr: {stderr}")
        }
        CliError::Response {
            hint: Some(hint), ..
        } => format!("{error}\n{hint}"),
        _ => error.to_string(),
    }
}
