//! Terminal title codec: maps the structured identity `(shortName, k)`
//! to a display name through configurable templates and back.
//!
//! A template is a literal string with `{shortName}` and `{k}`
//! placeholders. Parsing compiles the template into an anchored pattern:
//! literal runs are escaped, whitespace runs match flexibly,
//! `{shortName}` captures `[A-Za-z0-9_-]+` and `{k}` captures digits.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Template applied to the first (primary) client of a session.
pub const DEFAULT_PRIMARY_FORMAT: &str = "AI: {shortName}";

/// Template applied to additional concurrent clients (`k >= 2`).
pub const DEFAULT_MULTI_CLIENT_FORMAT: &str = "AI: {shortName} ({k})";

// ─── Identity ────────────────────────────────────────────────────────

/// Identity recovered from (or stamped into) a terminal title.
///
/// `client_index == 1` is the primary connection; higher indices are
/// additional concurrent clients. Never persisted: recomputed by
/// parsing window titles on every reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalIdentity {
    pub short_name: String,
    pub client_index: u32,
}

impl TerminalIdentity {
    pub fn primary(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            client_index: 1,
        }
    }

    pub fn client(short_name: impl Into<String>, client_index: u32) -> Self {
        Self {
            short_name: short_name.into(),
            client_index,
        }
    }
}

// ─── Naming config ───────────────────────────────────────────────────

/// The two user-configurable title templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    pub primary_format: String,
    pub multi_client_format: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            primary_format: DEFAULT_PRIMARY_FORMAT.to_owned(),
            multi_client_format: DEFAULT_MULTI_CLIENT_FORMAT.to_owned(),
        }
    }
}

impl NamingConfig {
    /// Render a display name for an identity. Literal substitution:
    /// the primary template for `client_index == 1`, the multi-client
    /// template otherwise.
    pub fn format(&self, identity: &TerminalIdentity) -> String {
        if identity.client_index == 1 {
            format_primary(&self.primary_format, &identity.short_name)
        } else {
            format_multi_client(
                &self.multi_client_format,
                &identity.short_name,
                identity.client_index,
            )
        }
    }

    /// Recover an identity from a display name.
    ///
    /// Tries the configured primary template (yields `client_index = 1`),
    /// then the configured multi-client template, then the two default
    /// templates for names created by earlier releases. Unparseable
    /// names yield `None`, never an error.
    pub fn parse(&self, name: &str) -> Option<TerminalIdentity> {
        match_primary(&self.primary_format, name)
            .or_else(|| match_multi_client(&self.multi_client_format, name))
            .or_else(|| match_primary(DEFAULT_PRIMARY_FORMAT, name))
            .or_else(|| match_multi_client(DEFAULT_MULTI_CLIENT_FORMAT, name))
    }
}

/// Substitute `{shortName}` into the primary template.
pub fn format_primary(format: &str, short_name: &str) -> String {
    format.replace("{shortName}", short_name)
}

/// Substitute `{shortName}` and `{k}` into the multi-client template.
pub fn format_multi_client(format: &str, short_name: &str, k: u32) -> String {
    format
        .replace("{shortName}", short_name)
        .replace("{k}", &k.to_string())
}

// ─── Template compilation ────────────────────────────────────────────

/// Compile a template into an anchored matcher. A template that the
/// regex engine rejects (e.g. a repeated placeholder) yields `None` and
/// the caller falls through to the next pattern.
fn compile_format(format: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    let mut rest = format;
    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("{shortName}") {
            pattern.push_str("(?P<short>[A-Za-z0-9_-]+)");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("{k}") {
            pattern.push_str("(?P<k>[0-9]+)");
            rest = tail;
        } else if ch.is_whitespace() {
            let end = rest
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(rest.len());
            pattern.push_str("\\s+");
            rest = &rest[end..];
        } else {
            let end = rest
                .char_indices()
                .find(|&(i, c)| {
                    c.is_whitespace()
                        || rest[i..].starts_with("{shortName}")
                        || rest[i..].starts_with("{k}")
                })
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            pattern.push_str(&regex::escape(&rest[..end]));
            rest = &rest[end..];
        }
    }
    pattern.push('$');
    Regex::new(&pattern).ok()
}

fn match_primary(format: &str, name: &str) -> Option<TerminalIdentity> {
    let re = compile_format(format)?;
    let caps = re.captures(name)?;
    Some(TerminalIdentity {
        short_name: caps.name("short")?.as_str().to_owned(),
        client_index: 1,
    })
}

fn match_multi_client(format: &str, name: &str) -> Option<TerminalIdentity> {
    let re = compile_format(format)?;
    let caps = re.captures(name)?;
    let short_name = caps.name("short")?.as_str().to_owned();
    let client_index = caps.name("k")?.as_str().parse::<u32>().ok()?;
    Some(TerminalIdentity {
        short_name,
        client_index,
    })
}
