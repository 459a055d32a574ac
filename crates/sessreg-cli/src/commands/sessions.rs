//! `sessreg create|list|show|resize|deactivate|touch|delete|purge`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sessreg_core::{Id, Registry, Session, TerminalParams, UpdateRequest};
use tracing::info;

/// Create a session owned by `login` and print its ID.
pub async fn run_create(registry: &Registry, login: &str, size: TerminalParams) -> Result<()> {
    let sess = Session::new(login, size, registry.now());
    registry
        .create_session(&sess)
        .await
        .context("failed to create session")?;
    println!("{}", sess.id);
    Ok(())
}

/// List live sessions as a table, or as JSON.
pub async fn run_list(registry: &Registry, json: bool) -> Result<()> {
    let sessions = registry.get_sessions().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    let now = registry.now();
    println!("{:<38} {:<12} {:<10} {:<8} {:<8} {}", "ID", "LOGIN", "SIZE", "PARTIES", "IDLE", "CREATED");
    for s in &sessions {
        println!(
            "{:<38} {:<12} {:<10} {:<8} {:<8} {}",
            s.id,
            s.login,
            s.terminal_params.to_string(),
            s.parties.len(),
            format!("{}s", idle_secs(now, s.last_active)),
            s.created.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    if sessions.is_empty() {
        println!("(no live sessions)");
    }
    Ok(())
}

/// Print one session.
pub async fn run_show(registry: &Registry, id: &Id, json: bool) -> Result<()> {
    let sess = fetch(registry, id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sess)?);
        return Ok(());
    }

    println!("id:          {}", sess.id);
    println!("login:       {}", sess.login);
    println!("active:      {}", sess.active);
    println!("size:        {}", sess.terminal_params);
    println!("created:     {}", sess.created.to_rfc3339());
    println!("last active: {}", sess.last_active.to_rfc3339());
    println!("expires in:  {}s", expires_in_secs(registry, &sess));
    println!("parties:     {}", sess.parties.len());
    for p in &sess.parties {
        println!("  {}  {:<12} {:<22} {}", p.id, p.user, p.remote_addr, p.server_id);
    }
    Ok(())
}

pub async fn run_resize(registry: &Registry, id: &Id, size: TerminalParams) -> Result<()> {
    registry
        .update_session(UpdateRequest::new(id.clone()).terminal_params(size))
        .await
        .with_context(|| format!("failed to resize session {id}"))?;
    info!(session_id = %id, size = %size, "resized");
    Ok(())
}

pub async fn run_deactivate(registry: &Registry, id: &Id) -> Result<()> {
    registry
        .update_session(UpdateRequest::new(id.clone()).active(false))
        .await
        .with_context(|| format!("failed to deactivate session {id}"))
}

pub async fn run_touch(registry: &Registry, id: &Id) -> Result<()> {
    registry
        .touch_session(id)
        .await
        .with_context(|| format!("failed to touch session {id}"))
}

pub async fn run_delete(registry: &Registry, id: &Id) -> Result<()> {
    registry
        .delete_session(id)
        .await
        .with_context(|| format!("failed to delete session {id}"))
}

/// Remove expired records and print their IDs.
pub async fn run_purge(registry: &Registry) -> Result<()> {
    let removed = registry.purge_expired().await?;
    for id in &removed {
        println!("{id}");
    }
    eprintln!("purged {} expired session(s)", removed.len());
    Ok(())
}

/// Fetch a session that is present and not expired.
pub(crate) async fn fetch(registry: &Registry, id: &Id) -> Result<Session> {
    registry
        .get_session(id)
        .await?
        .with_context(|| format!("session {id} not found or expired"))
}

/// Seconds until the session expires without further activity.
fn expires_in_secs(registry: &Registry, sess: &Session) -> i64 {
    let ttl = registry.active_session_ttl().as_secs() as i64;
    (ttl - idle_secs(registry.now(), sess.last_active)).max(0)
}

fn idle_secs(now: DateTime<Utc>, last_active: DateTime<Utc>) -> i64 {
    now.signed_duration_since(last_active).num_seconds().max(0)
}
