//! `sessreg join` / `sessreg leave`.
//!
//! Both read the session, build the full new party list, and write it back
//! through a single update.

use anyhow::{bail, Context, Result};
use sessreg_core::{Id, Party, Registry, UpdateRequest};
use tracing::info;

use super::sessions::fetch;

/// Append a party to a session and print the new party's ID.
pub async fn run_join(
    registry: &Registry,
    id: &Id,
    user: &str,
    remote_addr: &str,
    server_id: &str,
) -> Result<()> {
    let sess = fetch(registry, id).await?;
    if !sess.active {
        bail!("session {id} is inactive");
    }

    let party = Party::new(user, remote_addr, server_id, registry.now());
    let mut parties = sess.parties;
    parties.push(party.clone());

    registry
        .update_session(UpdateRequest::new(id.clone()).parties(parties))
        .await
        .with_context(|| format!("failed to join session {id}"))?;

    info!(session_id = %id, party = %party, "party joined");
    println!("{}", party.id);
    Ok(())
}

/// Remove a party from a session.
pub async fn run_leave(registry: &Registry, id: &Id, party_id: &Id) -> Result<()> {
    let mut sess = fetch(registry, id).await?;
    let Some(party) = sess.party(party_id).cloned() else {
        bail!("party {party_id} is not in session {id}");
    };
    sess.remove_party(party_id);

    registry
        .update_session(UpdateRequest::new(id.clone()).parties(sess.parties))
        .await
        .with_context(|| format!("failed to leave session {id}"))?;

    info!(session_id = %id, party = %party, "party left");
    Ok(())
}
