//! Backend candidate enumeration.
//!
//! The agent CLI keeps its coordination socket in a per-user
//! subdirectory (`tmux-<uid>`) of some temp directory; nothing
//! guarantees which one. Discovery takes the union of every plausible
//! base directory, probes each independently, and swallows per-directory
//! failures; a missing directory is simply not a candidate source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Socket names the CLI uses in stock installs, probed before the full
/// directory listing for the low-latency common case.
pub const WELL_KNOWN_SOCKETS: [&str; 2] = ["ai", "default"];

/// One possible transport: the temp directory handed to the CLI via
/// `TMUX_TMPDIR` plus the socket name handed via `TMUX_AI_SOCKET`.
/// Ephemeral: recomputed on every detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendCandidate {
    pub tmux_tmp_dir: PathBuf,
    pub socket: String,
}

// ─── Directory assembly ──────────────────────────────────────────────

/// Expand a leading `~` or `$HOME` reference against the given home.
pub fn expand_path_template(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path.replace("$HOME", &home.to_string_lossy()))
}

/// Union of candidate temp directories, deduplicated in insertion
/// order: explicit extras, the `TMUX_TMPDIR` hint, `/tmp`, the process
/// temp dir, `~/.tmux-tmp`, then each workspace root's `.tmux-tmp`.
pub fn assemble_tmp_dirs(
    extra: &[String],
    env_hint: Option<&str>,
    system_tmp: &Path,
    home: &Path,
    workspace_roots: &[PathBuf],
) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut push = |dirs: &mut Vec<PathBuf>, dir: PathBuf| {
        if !dir.as_os_str().is_empty() && !dirs.contains(&dir) {
            dirs.push(dir);
        }
    };

    for raw in extra {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            push(&mut dirs, expand_path_template(trimmed, home));
        }
    }
    if let Some(hint) = env_hint {
        let trimmed = hint.trim();
        if !trimmed.is_empty() {
            push(&mut dirs, expand_path_template(trimmed, home));
        }
    }
    push(&mut dirs, PathBuf::from("/tmp"));
    push(&mut dirs, system_tmp.to_path_buf());
    push(&mut dirs, home.join(".tmux-tmp"));
    for root in workspace_roots {
        push(&mut dirs, root.join(".tmux-tmp"));
    }

    dirs
}

/// [`assemble_tmp_dirs`] against the live process environment.
pub fn candidate_tmp_dirs(extra: &[String], workspace_roots: &[PathBuf]) -> Vec<PathBuf> {
    let env_hint = std::env::var("TMUX_TMPDIR").ok();
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    assemble_tmp_dirs(
        extra,
        env_hint.as_deref(),
        &std::env::temp_dir(),
        &home,
        workspace_roots,
    )
}

// ─── Socket enumeration ──────────────────────────────────────────────

/// Per-user socket subdirectory under one temp dir, `<dir>/tmux-<uid>`.
/// Platforms without a numeric uid contribute no candidates.
pub fn socket_dir_for(tmux_tmp_dir: &Path) -> Option<PathBuf> {
    numeric_uid().map(|uid| tmux_tmp_dir.join(format!("tmux-{uid}")))
}

#[cfg(unix)]
fn numeric_uid() -> Option<u32> {
    // SAFETY: getuid cannot fail and touches no memory.
    Some(unsafe { libc::getuid() })
}

#[cfg(not(unix))]
fn numeric_uid() -> Option<u32> {
    None
}

/// Enumerate socket candidates under the per-user subdirectory of each
/// temp dir. Entries count only if `lstat` reports an actual socket.
/// Deduplicated by `(dir, socket)` and sorted by socket name, then
/// directory, so presentation and assertions are deterministic.
pub async fn list_socket_candidates(tmp_dirs: &[PathBuf]) -> Vec<BackendCandidate> {
    let mut candidates: Vec<BackendCandidate> = Vec::new();
    let mut seen: HashSet<(PathBuf, String)> = HashSet::new();

    for tmux_tmp_dir in tmp_dirs {
        let Some(socket_dir) = socket_dir_for(tmux_tmp_dir) else {
            continue;
        };

        for name in WELL_KNOWN_SOCKETS {
            if is_socket(&socket_dir.join(name)).await {
                push_candidate(&mut candidates, &mut seen, tmux_tmp_dir, name);
            }
        }

        let mut entries = match tokio::fs::read_dir(&socket_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %socket_dir.display(), error = %e, "socket dir not readable");
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if is_socket(&entry.path()).await {
                push_candidate(&mut candidates, &mut seen, tmux_tmp_dir, name);
            }
        }
    }

    candidates.sort_by(|a, b| {
        a.socket
            .cmp(&b.socket)
            .then_with(|| a.tmux_tmp_dir.cmp(&b.tmux_tmp_dir))
    });
    candidates
}

fn push_candidate(
    candidates: &mut Vec<BackendCandidate>,
    seen: &mut HashSet<(PathBuf, String)>,
    tmux_tmp_dir: &Path,
    socket: &str,
) {
    if seen.insert((tmux_tmp_dir.to_path_buf(), socket.to_owned())) {
        candidates.push(BackendCandidate {
            tmux_tmp_dir: tmux_tmp_dir.to_path_buf(),
            socket: socket.to_owned(),
        });
    }
}

async fn is_socket(path: &Path) -> bool {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => is_socket_file_type(&meta),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn is_socket_file_type(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_socket()
}

#[cfg(not(unix))]
fn is_socket_file_type(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. path template expansion ──────────────────────────────────

    #[test]
    fn expands_tilde_and_home() {
        let home = Path::new("/home/dev");
        assert_eq!(expand_path_template("~", home), PathBuf::from("/home/dev"));
        assert_eq!(
            expand_path_template("~/x/y", home),
            PathBuf::from("/home/dev/x/y")
        );
        assert_eq!(
            expand_path_template("$HOME/.tmux-tmp", home),
            PathBuf::from("/home/dev/.tmux-tmp")
        );
        assert_eq!(expand_path_template("/tmp", home), PathBuf::from("/tmp"));
    }

    // ── 2. directory assembly ───────────────────────────────────────

    #[test]
    fn assembles_union_in_order() {
        let home = Path::new("/home/dev");
        let dirs = assemble_tmp_dirs(
            &["~/custom".to_owned()],
            Some("/var/tmux"),
            Path::new("/var/tmp"),
            home,
            &[PathBuf::from("/work/repo")],
        );
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/home/dev/custom"),
                PathBuf::from("/var/tmux"),
                PathBuf::from("/tmp"),
                PathBuf::from("/var/tmp"),
                PathBuf::from("/home/dev/.tmux-tmp"),
                PathBuf::from("/work/repo/.tmux-tmp"),
            ]
        );
    }

    #[test]
    fn duplicates_collapse() {
        let home = Path::new("/home/dev");
        let dirs = assemble_tmp_dirs(
            &["/tmp".to_owned(), " ".to_owned()],
            Some("/tmp"),
            Path::new("/tmp"),
            home,
            &[],
        );
        assert_eq!(
            dirs,
            vec![PathBuf::from("/tmp"), PathBuf::from("/home/dev/.tmux-tmp")]
        );
    }

    // ── 3. socket enumeration ───────────────────────────────────────

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use std::os::unix::net::UnixListener;
        use tempfile::TempDir;

        fn make_socket_dir(base: &TempDir) -> PathBuf {
            let dir = socket_dir_for(base.path()).expect("unix has a uid");
            std::fs::create_dir_all(&dir).expect("mkdir");
            dir
        }

        #[tokio::test]
        async fn only_real_sockets_count() {
            let base = TempDir::new().expect("tempdir");
            let socket_dir = make_socket_dir(&base);

            let _listener = UnixListener::bind(socket_dir.join("ai")).expect("bind");
            std::fs::write(socket_dir.join("not-a-socket"), b"x").expect("write");

            let found = list_socket_candidates(&[base.path().to_path_buf()]).await;
            assert_eq!(
                found,
                vec![BackendCandidate {
                    tmux_tmp_dir: base.path().to_path_buf(),
                    socket: "ai".to_owned(),
                }]
            );
        }

        #[tokio::test]
        async fn missing_directory_contributes_nothing() {
            let base = TempDir::new().expect("tempdir");
            // No per-uid subdir created at all.
            let found = list_socket_candidates(&[
                base.path().to_path_buf(),
                PathBuf::from("/nonexistent-root"),
            ])
            .await;
            assert!(found.is_empty());
        }

        #[tokio::test]
        async fn results_sorted_and_deduplicated() {
            let base_a = TempDir::new().expect("tempdir");
            let base_b = TempDir::new().expect("tempdir");
            let dir_a = make_socket_dir(&base_a);
            let dir_b = make_socket_dir(&base_b);

            let _s1 = UnixListener::bind(dir_a.join("zz")).expect("bind");
            let _s2 = UnixListener::bind(dir_a.join("ai")).expect("bind");
            let _s3 = UnixListener::bind(dir_b.join("ai")).expect("bind");

            // Passing a dir twice must not duplicate its sockets.
            let found = list_socket_candidates(&[
                base_a.path().to_path_buf(),
                base_a.path().to_path_buf(),
                base_b.path().to_path_buf(),
            ])
            .await;

            let as_pairs: Vec<(String, PathBuf)> = found
                .into_iter()
                .map(|c| (c.socket, c.tmux_tmp_dir))
                .collect();
            let mut expected = vec![
                ("ai".to_owned(), base_a.path().to_path_buf()),
                ("ai".to_owned(), base_b.path().to_path_buf()),
                ("zz".to_owned(), base_a.path().to_path_buf()),
            ];
            expected.sort();
            assert_eq!(as_pairs, expected);
        }
    }
}
