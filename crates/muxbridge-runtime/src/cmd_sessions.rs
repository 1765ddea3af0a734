//! `muxbridge sessions`: list live sessions grouped by type.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use muxbridge_core::SessionInfo;
use muxbridge_proto::ListOk;
use muxbridge_sync::BridgeConfig;

use crate::context;

pub async fn cmd_sessions(config: &BridgeConfig, json: bool) -> anyhow::Result<()> {
    let client = context::client_for(config)?;
    let list = client
        .list()
        .await
        .map_err(|e| anyhow::anyhow!(context::render_error(&e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }
    print!("{}", render_sessions(&list));
    Ok(())
}

fn render_sessions(list: &ListOk) -> String {
    if list.sessions.is_empty() {
        return "no sessions\n".to_owned();
    }

    let mut by_type: BTreeMap<&str, Vec<&SessionInfo>> = BTreeMap::new();
    for session in &list.sessions {
        by_type.entry(session.type_id.as_str()).or_default().push(session);
    }

    let mut out = String::new();
    for (type_id, mut sessions) in by_type {
        let label = list
            .types
            .get(type_id)
            .map_or(type_id, |info| info.label.as_str());
        let _ = writeln!(out, "{label} ({})", sessions.len());

        sessions.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        for session in sessions {
            let status = if session.attached_clients > 0 {
                format!("attached ({})", session.attached_clients)
            } else {
                "idle".to_owned()
            };
            let _ = writeln!(
                out,
                "  {:<20} {:<14} last used {}",
                session.short_name, status, session.last_used
            );
        }
    }
    out
}
