//! `muxbridge doctor`: configuration and environment report for bug
//! reports and stale-transport debugging.

use muxbridge_proto::{CliClient, CliOptions};
use muxbridge_sync::{BridgeConfig, ENV_BACKEND_FIXED, ENV_CONFIG_DIR, ENV_SOCKET, ENV_TMP_DIR};

use crate::context;

const UNSET: &str = "<unset>";

pub async fn cmd_doctor(config: &BridgeConfig) -> anyhow::Result<()> {
    let mut lines = vec![format!("muxbridge {}", env!("CARGO_PKG_VERSION"))];

    let path_or_unset = |value: &Option<std::path::PathBuf>| {
        value
            .as_ref()
            .map_or(UNSET.to_owned(), |p| p.display().to_string())
    };
    let or_unset = |value: &Option<String>| value.clone().unwrap_or_else(|| UNSET.to_owned());

    lines.push(format!("- cliPath: {}", path_or_unset(&config.cli_path)));
    lines.push(format!("- socket: {}", or_unset(&config.socket)));
    lines.push(format!("- configDir: {}", or_unset(&config.config_dir)));
    lines.push(format!("- tmuxTmpDir: {}", or_unset(&config.tmux_tmp_dir)));
    lines.push(format!("- autoDetectBackend: {}", config.auto_detect_backend));

    for key in ["TMUX", ENV_BACKEND_FIXED, ENV_SOCKET, ENV_CONFIG_DIR, ENV_TMP_DIR] {
        let value = std::env::var(key).unwrap_or_else(|_| UNSET.to_owned());
        lines.push(format!("- env.{key}: {value}"));
    }

    match &config.cli_path {
        None => lines.push("- list: <no agent CLI configured>".to_owned()),
        Some(cli_path) => {
            let client = CliClient::new(config.client_options(cli_path));
            match client.list().await {
                Ok(list) => {
                    lines.push(format!("- list: {}", context::list_summary(&list)));

                    // A pinned transport reporting nothing is the
                    // classic stale-socket symptom; show what the tool
                    // sees with the pins cleared.
                    if list.sessions.is_empty() && config.has_transport_override() {
                        let relaxed = CliClient::new(
                            CliOptions::new(cli_path).with_env(config.relaxed_env_overrides()),
                        );
                        match relaxed.list().await {
                            Ok(list) => lines.push(format!(
                                "- relaxed probe: {}",
                                context::list_summary(&list)
                            )),
                            Err(error) => lines.push(format!(
                                "- relaxed probe failed: {}",
                                context::render_error(&error)
                            )),
                        }
                    }
                }
                Err(error) => {
                    lines.push(format!("- list failed: {}", context::render_error(&error)));
                }
            }
        }
    }

    println!("{}", lines.join("\n"));
    Ok(())
}
