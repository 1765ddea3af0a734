//! `muxbridge detect`: scan for backend candidates and probe each
//! one, candidates with sessions first.

use anyhow::Context as _;
use muxbridge_backend::{BackendCandidate, candidate_tmp_dirs, list_socket_candidates};
use muxbridge_proto::{CliClient, CliError, CliOptions, ListOk};
use muxbridge_sync::{BridgeConfig, ENV_SOCKET, ENV_TMP_DIR};

use crate::context;

pub async fn cmd_detect(config: &BridgeConfig, json: bool) -> anyhow::Result<()> {
    let cli_path = config
        .cli_path
        .clone()
        .context("no agent CLI executable configured (use --cli-path or MUXBRIDGE_CLI)")?;

    let mut search = config.discovery_search_paths.clone();
    search.extend(config.tmux_tmp_dir.iter().cloned());
    let tmp_dirs = candidate_tmp_dirs(&search, &config.workspace_roots);
    let candidates = list_socket_candidates(&tmp_dirs).await;
    if candidates.is_empty() {
        println!("no backend candidates found (no tmux socket directory under /tmp or TMUX_TMPDIR)");
        return Ok(());
    }

    // Sequential probes, matching how the reconciler's detection pass
    // bounds subprocess concurrency.
    let mut probes: Vec<(BackendCandidate, Result<ListOk, CliError>)> = Vec::new();
    for candidate in candidates {
        let mut env = config.env_overrides();
        env.insert(ENV_SOCKET.to_owned(), candidate.socket.clone());
        env.insert(
            ENV_TMP_DIR.to_owned(),
            candidate.tmux_tmp_dir.display().to_string(),
        );
        let client = CliClient::new(CliOptions::new(&cli_path).with_env(env));
        let result = client.list().await;
        probes.push((candidate, result));
    }

    let session_count = |result: &Result<ListOk, CliError>| {
        result.as_ref().map(|list| list.sessions.len()).unwrap_or(0)
    };
    probes.sort_by(|(a, ra), (b, rb)| {
        session_count(rb)
            .cmp(&session_count(ra))
            .then_with(|| a.socket.cmp(&b.socket))
    });

    if json {
        let rows: Vec<serde_json::Value> = probes
            .iter()
            .map(|(candidate, result)| {
                let dir = candidate.tmux_tmp_dir.display().to_string();
                match result {
                    Ok(list) => serde_json::json!({
                        "socket": candidate.socket,
                        "tmuxTmpDir": dir,
                        "sessions": list.sessions.len(),
                        "summary": context::list_summary(list),
                    }),
                    Err(error) => serde_json::json!({
                        "socket": candidate.socket,
                        "tmuxTmpDir": dir,
                        "error": context::render_error(error),
                    }),
                }
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (candidate, result) in &probes {
        let dir = candidate.tmux_tmp_dir.display();
        match result {
            Ok(list) => {
                println!("{:<16} {:<40} {}", candidate.socket, dir, context::list_summary(list));
            }
            Err(error) => {
                println!(
                    "{:<16} {:<40} error: {}",
                    candidate.socket,
                    dir,
                    context::render_error(error)
                );
            }
        }
    }
    Ok(())
}
