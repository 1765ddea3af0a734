//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use muxbridge_sync::BridgeConfig;

#[derive(Parser)]
#[command(
    name = "muxbridge",
    about = "Bridge tmux-managed agent sessions into editor terminals",
    version
)]
pub struct Cli {
    /// Path to the agent CLI executable.
    #[arg(long, env = "MUXBRIDGE_CLI", global = true)]
    pub cli_path: Option<PathBuf>,

    /// Socket name relayed to the agent CLI (TMUX_AI_SOCKET).
    #[arg(long, env = "TMUX_AI_SOCKET", global = true)]
    pub socket: Option<String>,

    /// Config directory relayed to the agent CLI (TMUX_AI_CONFIG).
    #[arg(long, env = "TMUX_AI_CONFIG", global = true)]
    pub config_dir: Option<String>,

    /// Temp-directory root relayed to the agent CLI (TMUX_TMPDIR).
    #[arg(long = "tmux-tmpdir", env = "TMUX_TMPDIR", global = true)]
    pub tmux_tmp_dir: Option<String>,

    /// Extra directories scanned during backend detection.
    #[arg(long = "search-path", global = true)]
    pub search_paths: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List live sessions grouped by type.
    Sessions(SessionsOpts),
    /// Scan for backend candidates and probe each one.
    Detect(DetectOpts),
    /// Print a configuration and environment report.
    Doctor,
}

#[derive(Args, Default)]
pub struct SessionsOpts {
    /// Print the raw list payload as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Default)]
pub struct DetectOpts {
    /// Print probe results as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Assemble the bridge configuration from flags and environment.
pub fn bridge_config(cli: &Cli) -> BridgeConfig {
    BridgeConfig {
        cli_path: cli.cli_path.clone(),
        socket: cli.socket.clone(),
        config_dir: cli.config_dir.clone(),
        tmux_tmp_dir: cli.tmux_tmp_dir.clone(),
        discovery_search_paths: cli.search_paths.clone(),
        ..BridgeConfig::default()
    }
}
