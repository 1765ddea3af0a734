//! muxbridge-backend: discovery of plausible agent CLI transports.
//! Assembles candidate tmux temp directories, resolves the per-user
//! socket subdirectory, and enumerates live sockets. Pure filesystem
//! probing; nothing here talks to the CLI.

pub mod candidates;

pub use candidates::{
    BackendCandidate, WELL_KNOWN_SOCKETS, assemble_tmp_dirs, candidate_tmp_dirs,
    expand_path_template, list_socket_candidates, socket_dir_for,
};
