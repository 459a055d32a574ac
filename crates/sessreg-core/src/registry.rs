//! The session registry.
//!
//! Stores session records as JSON under the `sessions` namespace of a
//! [`Backend`]. Liveness is never stored: a record whose `last_active` is
//! `active_session_ttl` or more in the past is treated as absent on read.
//! Nothing here runs in the background; [`Registry::purge_expired`] is the
//! only way expired records leave the backend, and callers decide when.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError};
use crate::clock::{Clock, SystemClock};
use crate::error::{RegistryError, RegistryResult};
use crate::id::Id;
use crate::session::{Session, UpdateRequest};

/// How long a session stays visible without activity.
pub const ACTIVE_SESSION_TTL: Duration = Duration::from_secs(20);

const SESSIONS: &str = "sessions";

/// Session registry over a backend and a clock.
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    active_session_ttl: Duration,
}

impl Registry {
    /// Create a registry using wall-clock time and the default TTL.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            active_session_ttl: ACTIVE_SESSION_TTL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_active_session_ttl(mut self, ttl: Duration) -> Self {
        self.active_session_ttl = ttl;
        self
    }

    pub fn active_session_ttl(&self) -> Duration {
        self.active_session_ttl
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Store a new session. Fails with `AlreadyExists` if the ID is taken.
    ///
    /// `created` and `last_active` are stored exactly as given. The session
    /// must be active.
    pub async fn create_session(&self, sess: &Session) -> RegistryResult<()> {
        sess.check()?;
        if !sess.active {
            return Err(RegistryError::BadParameter(format!(
                "session {}: a new session must be active",
                sess.id
            )));
        }
        let data = serde_json::to_vec(sess)?;
        self.backend
            .create(SESSIONS, sess.id.as_str(), data)
            .await
            .map_err(|e| backend_error(e, &sess.id))?;

        info!(session_id = %sess.id, login = %sess.login, "session created");
        Ok(())
    }

    /// Fetch a session, or `None` if it does not exist or has expired.
    ///
    /// Manually deactivated sessions are still returned, with `active == false`.
    pub async fn get_session(&self, id: &Id) -> RegistryResult<Option<Session>> {
        id.check()?;
        let Some(sess) = self.load(id).await? else {
            return Ok(None);
        };
        if sess.is_expired(self.clock.now(), self.active_session_ttl) {
            debug!(session_id = %id, last_active = %sess.last_active, "session expired");
            return Ok(None);
        }
        Ok(Some(sess))
    }

    /// All live sessions (active and not expired), oldest first.
    pub async fn get_sessions(&self) -> RegistryResult<Vec<Session>> {
        let now = self.clock.now();
        let mut out: Vec<Session> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|sess| sess.is_live(now, self.active_session_ttl))
            .collect();
        out.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        debug!(count = out.len(), "listed sessions");
        Ok(out)
    }

    /// Apply a merge-patch to an existing session.
    ///
    /// Fails with `NotFound` if the session is absent or has expired.
    /// Concurrent updates to the same session are last-writer-wins.
    pub async fn update_session(&self, req: UpdateRequest) -> RegistryResult<()> {
        req.check()?;
        let id = req.id.clone();

        let mut sess = self
            .load(&id)
            .await?
            .ok_or_else(|| not_found(&id))?;
        if sess.is_expired(self.clock.now(), self.active_session_ttl) {
            debug!(session_id = %id, "refusing to update expired session");
            return Err(not_found(&id));
        }

        if req.is_empty() {
            debug!(session_id = %id, "empty update, nothing to write");
            return Ok(());
        }

        req.apply(&mut sess);
        let data = serde_json::to_vec(&sess)?;
        self.backend
            .put(SESSIONS, id.as_str(), data)
            .await
            .map_err(|e| backend_error(e, &id))?;

        info!(
            session_id = %id,
            active = sess.active,
            terminal = %sess.terminal_params,
            parties = sess.parties.len(),
            "session updated"
        );
        Ok(())
    }

    /// Record activity on a session now.
    pub async fn touch_session(&self, id: &Id) -> RegistryResult<()> {
        self.update_session(UpdateRequest::new(id.clone()).last_active(self.clock.now()))
            .await
    }

    /// Remove a session record permanently, expired or not.
    pub async fn delete_session(&self, id: &Id) -> RegistryResult<()> {
        id.check()?;
        self.backend
            .delete(SESSIONS, id.as_str())
            .await
            .map_err(|e| backend_error(e, id))?;

        info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Delete every expired record from the backend.
    ///
    /// Returns the IDs that were removed.
    pub async fn purge_expired(&self) -> RegistryResult<Vec<Id>> {
        let now = self.clock.now();
        let mut removed = Vec::new();

        for sess in self.load_all().await? {
            if !sess.is_expired(now, self.active_session_ttl) {
                continue;
            }
            match self.backend.delete(SESSIONS, sess.id.as_str()).await {
                Ok(()) => removed.push(sess.id),
                // someone else got there first
                Err(BackendError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "purged expired sessions");
        }
        Ok(removed)
    }

    /// Read a record regardless of liveness.
    async fn load(&self, id: &Id) -> RegistryResult<Option<Session>> {
        match self.backend.get(SESSIONS, id.as_str()).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(BackendError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every decodable record regardless of liveness.
    async fn load_all(&self) -> RegistryResult<Vec<Session>> {
        let entries = self.backend.get_all(SESSIONS).await?;
        let mut out = Vec::with_capacity(entries.len());
        for (key, data) in entries {
            match serde_json::from_slice::<Session>(&data) {
                Ok(sess) => out.push(sess),
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable session record"),
            }
        }
        Ok(out)
    }
}

fn not_found(id: &Id) -> RegistryError {
    RegistryError::NotFound(format!("session {id}"))
}

fn backend_error(e: BackendError, id: &Id) -> RegistryError {
    match e {
        BackendError::NotFound { .. } => not_found(id),
        BackendError::AlreadyExists { .. } => RegistryError::AlreadyExists(format!("session {id}")),
        other => RegistryError::Backend(other),
    }
}
