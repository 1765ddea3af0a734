//! Subprocess client for the agent CLI.
//!
//! One invocation per verb: `<executable> <verb> --json [args...]`,
//! bounded by a wall-clock timeout and an stdout cap. Stdout is decoded
//! against the versioned contract regardless of the exit code: some
//! tool versions report application errors as structured JSON with a
//! non-zero exit, and those must surface as response errors, not be
//! masked as execution failures.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};

use crate::error::{CliError, ExecFailure};
use crate::protocol::{AttachOk, EXPECTED_PROTOCOL_VERSION, ListOk, NewOk, OkSimple, RenameOk};

/// Default wall-clock budget for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default stdout cap.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

const STDOUT_HEAD_CHARS: usize = 200;

const LIST_ARGS: &[&str] = &["list", "--json"];

// ─── Options ─────────────────────────────────────────────────────────

/// Connection parameters for one client instance. Two clients with
/// equal options are interchangeable; the factory layer caches on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub cli_path: PathBuf,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    /// Extra environment relayed to the subprocess (transport
    /// overrides); absent keys mean "let the tool pick its default".
    pub env: BTreeMap<String, String>,
}

impl CliOptions {
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}

// ─── Client ──────────────────────────────────────────────────────────

type SharedList = Arc<OnceCell<Result<ListOk, CliError>>>;

/// Agent CLI client. Cheap to share behind an `Arc`; concurrent
/// `list()` calls made while one is in flight share that call's result
/// instead of spawning a duplicate subprocess.
pub struct CliClient {
    options: CliOptions,
    list_inflight: Mutex<Option<SharedList>>,
}

impl CliClient {
    pub fn new(options: CliOptions) -> Self {
        Self {
            options,
            list_inflight: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &CliOptions {
        &self.options
    }

    /// `list`: the authoritative session snapshot. Coalesced: the
    /// in-flight slot holds at most one pending call, cleared when it
    /// settles.
    pub async fn list(&self) -> Result<ListOk, CliError> {
        let cell = {
            let mut slot = self.list_inflight.lock().await;
            match slot.as_ref() {
                Some(cell) => Arc::clone(cell),
                None => {
                    let cell: SharedList = Arc::new(OnceCell::new());
                    *slot = Some(Arc::clone(&cell));
                    cell
                }
            }
        };

        let result = cell
            .get_or_init(|| self.exec_json::<ListOk>(LIST_ARGS))
            .await
            .clone();

        let mut slot = self.list_inflight.lock().await;
        if let Some(current) = slot.as_ref()
            && Arc::ptr_eq(current, &cell)
        {
            *slot = None;
        }
        result
    }

    /// `new --type <id> [--name <name>]`: create a session.
    pub async fn new_session(
        &self,
        type_id: &str,
        short_name: Option<&str>,
    ) -> Result<NewOk, CliError> {
        let mut args = vec!["new", "--json", "--type", type_id];
        if let Some(name) = short_name {
            args.extend(["--name", name]);
        }
        self.exec_json(&args).await
    }

    /// `attach <shortName>`: returns the argv to execute in a new
    /// terminal window.
    pub async fn attach(&self, short_name: &str) -> Result<AttachOk, CliError> {
        self.exec_json(&["attach", "--json", short_name]).await
    }

    /// `rename <old> <new>`.
    pub async fn rename(&self, old: &str, new: &str) -> Result<RenameOk, CliError> {
        self.exec_json(&["rename", "--json", old, new]).await
    }

    /// `kill <shortName>`.
    pub async fn kill(&self, short_name: &str) -> Result<OkSimple, CliError> {
        self.exec_json(&["kill", "--json", short_name]).await
    }

    /// `detach-all <shortName>`.
    pub async fn detach_all(&self, short_name: &str) -> Result<OkSimple, CliError> {
        self.exec_json(&["detach-all", "--json", short_name]).await
    }

    async fn exec_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, CliError> {
        let mut command = tokio::process::Command::new(&self.options.cli_path);
        command
            .args(args)
            .envs(&self.options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.options.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CliError::Exec {
                    detail: ExecFailure::Spawn(e.to_string()),
                    exit_code: None,
                    stderr: String::new(),
                });
            }
            // Dropping the output future kills the child (kill_on_drop).
            Err(_) => {
                return Err(CliError::Exec {
                    detail: ExecFailure::Timeout,
                    exit_code: None,
                    stderr: String::new(),
                });
            }
        };

        let exit_code = output.status.code();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !stderr.is_empty() {
            tracing::debug!(%stderr, "agent CLI stderr");
        }

        if output.stdout.len() > self.options.max_output_bytes {
            return Err(CliError::Exec {
                detail: ExecFailure::OutputTooLarge {
                    limit_bytes: self.options.max_output_bytes,
                },
                exit_code,
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        decode_response(&stdout, exit_code, stderr)
    }
}

// ─── Decoding ────────────────────────────────────────────────────────

/// Decode one stdout capture against the response contract.
///
/// Order matters: JSON first, then `protocolVersion`, then `ok`, then
/// the payload shape. The exit code never short-circuits decoding.
fn decode_response<T: DeserializeOwned>(
    stdout: &str,
    exit_code: Option<i32>,
    stderr: String,
) -> Result<T, CliError> {
    let value: serde_json::Value = match serde_json::from_str(stdout) {
        Ok(value) => value,
        Err(_) => {
            return Err(CliError::Exec {
                detail: ExecFailure::NotJson {
                    stdout_head: stdout.chars().take(STDOUT_HEAD_CHARS).collect(),
                },
                exit_code,
                stderr,
            });
        }
    };

    let actual = value.get("protocolVersion");
    let version_matches =
        actual.and_then(serde_json::Value::as_u64) == Some(u64::from(EXPECTED_PROTOCOL_VERSION));
    if !version_matches {
        return Err(CliError::Protocol {
            expected: EXPECTED_PROTOCOL_VERSION,
            actual: actual.map_or_else(|| "<missing>".to_owned(), serde_json::Value::to_string),
        });
    }

    if value.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
        return Err(CliError::Response {
            code: string_field(&value, "code"),
            message: string_field(&value, "message"),
            hint: value
                .get("hint")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            protocol_version: EXPECTED_PROTOCOL_VERSION,
        });
    }

    serde_json::from_value(value).map_err(|e| CliError::Exec {
        detail: ExecFailure::Shape(e.to_string()),
        exit_code,
        stderr,
    })
}

fn string_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}
