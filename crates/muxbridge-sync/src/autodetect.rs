//! Backend auto-detection driver.
//!
//! Runs when the authoritative `list` is empty but orphaned windows
//! imply sessions still exist on some other transport. Candidates are
//! probed sequentially (bounding subprocess concurrency and keeping
//! the pass deterministic under timeouts); per-candidate failures are
//! merely evidence the candidate is not viable.

use std::collections::BTreeSet;
use std::path::Path;

use muxbridge_backend::{BackendCandidate, candidate_tmp_dirs, list_socket_candidates};
use muxbridge_core::{CandidateScore, score_candidate, select_unique_best};
use muxbridge_proto::CliOptions;

use crate::config::{BridgeConfig, ConfigStore, ENV_SOCKET, ENV_TMP_DIR};
use crate::factory::ClientFactory;

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// A stale transport pin was hiding sessions; the pin was cleared.
    ClearedOverrides,
    /// A unique best candidate was written to configuration.
    Promoted(BackendCandidate),
    /// No candidate, no positive evidence, a tie at the top, or the
    /// winner already matches configuration. Nothing was changed.
    Unresolved,
}

pub(crate) async fn run(
    factory: &mut ClientFactory,
    store: &mut dyn ConfigStore,
    config: &BridgeConfig,
    cli_path: &Path,
    wanted: &BTreeSet<String>,
) -> DetectionOutcome {
    // A pinned transport that reports nothing is more often stale than
    // wrong-directory: try once with every pin cleared before paying
    // for the full candidate scan.
    if config.has_transport_override() {
        let options = CliOptions::new(cli_path).with_env(config.relaxed_env_overrides());
        let client = factory.client(options);
        match client.list().await {
            Ok(list) if !list.sessions.is_empty() => {
                tracing::info!(
                    sessions = list.sessions.len(),
                    "relaxed probe found sessions; clearing pinned transport"
                );
                store.update_socket(None);
                store.update_tmux_tmp_dir(None);
                factory.invalidate();
                return DetectionOutcome::ClearedOverrides;
            }
            Ok(_) => {}
            Err(error) => {
                tracing::debug!(%error, "relaxed probe failed");
            }
        }
    }

    let extra: Vec<String> = config.tmux_tmp_dir.iter().cloned().collect();
    let mut search = config.discovery_search_paths.clone();
    search.extend(extra);
    let tmp_dirs = candidate_tmp_dirs(&search, &config.workspace_roots);
    let candidates = list_socket_candidates(&tmp_dirs).await;
    if candidates.is_empty() {
        tracing::debug!("no backend candidates found");
        return DetectionOutcome::Unresolved;
    }

    let mut scores: Vec<CandidateScore> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let mut env = config.env_overrides();
        env.insert(ENV_SOCKET.to_owned(), candidate.socket.clone());
        env.insert(
            ENV_TMP_DIR.to_owned(),
            candidate.tmux_tmp_dir.display().to_string(),
        );
        let client = factory.client(CliOptions::new(cli_path).with_env(env));
        let score = match client.list().await {
            Ok(list) => score_candidate(
                wanted,
                list.sessions.iter().map(|s| s.short_name.as_str()),
            ),
            Err(error) => {
                tracing::debug!(socket = %candidate.socket, %error, "candidate probe failed");
                CandidateScore {
                    match_count: 0,
                    sessions_count: 0,
                }
            }
        };
        scores.push(score);
    }

    let Some(winner_idx) = select_unique_best(&scores) else {
        tracing::debug!(candidates = candidates.len(), "backend detection inconclusive");
        return DetectionOutcome::Unresolved;
    };
    let Some(winner) = candidates.get(winner_idx).cloned() else {
        return DetectionOutcome::Unresolved;
    };

    let winner_dir = winner.tmux_tmp_dir.display().to_string();
    let already_configured = config.socket.as_deref() == Some(winner.socket.as_str())
        && config.tmux_tmp_dir.as_deref() == Some(winner_dir.as_str());
    if already_configured {
        return DetectionOutcome::Unresolved;
    }

    tracing::info!(socket = %winner.socket, dir = %winner_dir, "promoting auto-detected backend");
    store.update_socket(Some(winner.socket.clone()));
    store.update_tmux_tmp_dir(Some(winner_dir));
    factory.invalidate();
    DetectionOutcome::Promoted(winner)
}
