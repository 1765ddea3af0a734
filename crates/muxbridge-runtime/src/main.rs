//! muxbridge: diagnostic CLI for the agent-session bridge.
//! Exercises the protocol client, backend discovery and detection
//! scoring from a plain terminal; the editor glue embeds the same
//! library crates.

use clap::Parser;

mod cli;
mod cmd_detect;
mod cmd_doctor;
mod cmd_sessions;
mod context;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("MUXBRIDGE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = cli::bridge_config(&args);
    let command = args
        .command
        .unwrap_or_else(|| cli::Command::Sessions(cli::SessionsOpts::default()));

    match command {
        cli::Command::Sessions(opts) => cmd_sessions::cmd_sessions(&config, opts.json).await?,
        cli::Command::Detect(opts) => cmd_detect::cmd_detect(&config, opts.json).await?,
        cli::Command::Doctor => cmd_doctor::cmd_doctor(&config).await?,
    }

    Ok(())
}
