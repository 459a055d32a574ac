//! Session records and the merge-patch update request.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::id::Id;

/// Largest accepted terminal width or height.
pub const MAX_TERMINAL_SIZE: u16 = 4096;

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalParams {
    /// Width in columns.
    pub w: u16,
    /// Height in rows.
    pub h: u16,
}

impl TerminalParams {
    pub fn new(w: u16, h: u16) -> Self {
        Self { w, h }
    }

    pub fn check(&self) -> RegistryResult<()> {
        if self.w == 0 || self.w > MAX_TERMINAL_SIZE {
            return Err(RegistryError::BadParameter(format!("bad terminal width {}", self.w)));
        }
        if self.h == 0 || self.h > MAX_TERMINAL_SIZE {
            return Err(RegistryError::BadParameter(format!("bad terminal height {}", self.h)));
        }
        Ok(())
    }
}

impl fmt::Display for TerminalParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.w, self.h)
    }
}

/// Parses the `W:H` form, e.g. `120:40`.
impl FromStr for TerminalParams {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RegistryError::BadParameter(format!("terminal size {s:?}, expected W:H"));
        let (w, h) = s.split_once(':').ok_or_else(bad)?;
        let params = Self {
            w: w.trim().parse().map_err(|_| bad())?,
            h: h.trim().parse().map_err(|_| bad())?,
        };
        params.check()?;
        Ok(params)
    }
}

/// One participant attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Id,
    pub remote_addr: String,
    /// Login identity of the participant.
    pub user: String,
    /// Node the party connected through.
    pub server_id: String,
    pub last_active: DateTime<Utc>,
}

impl Party {
    pub fn new(
        user: impl Into<String>,
        remote_addr: impl Into<String>,
        server_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::new(),
            remote_addr: remote_addr.into(),
            user: user.into(),
            server_id: server_id.into(),
            last_active: now,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party({}, user={}, addr={}, server={})", self.id, self.user, self.remote_addr, self.server_id)
    }
}

/// A live interactive terminal session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Id,
    /// Cleared only by an explicit update; TTL expiry never touches it.
    pub active: bool,
    pub terminal_params: TerminalParams,
    /// Login identity that owns the session.
    pub login: String,
    pub last_active: DateTime<Utc>,
    pub created: DateTime<Utc>,
    /// Parties in join order.
    #[serde(default)]
    pub parties: Vec<Party>,
}

impl Session {
    /// A fresh active session with no parties.
    pub fn new(login: impl Into<String>, terminal_params: TerminalParams, now: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            active: true,
            terminal_params,
            login: login.into(),
            last_active: now,
            created: now,
            parties: Vec::new(),
        }
    }

    /// Validate the record before it is written.
    pub fn check(&self) -> RegistryResult<()> {
        self.id.check()?;
        if self.login.trim().is_empty() {
            return Err(RegistryError::BadParameter("missing login".into()));
        }
        self.terminal_params.check()?;
        check_parties(&self.parties)
    }

    /// Look up a party by ID.
    pub fn party(&self, id: &Id) -> Option<&Party> {
        self.parties.iter().find(|p| &p.id == id)
    }

    /// Remove the party with the given ID, keeping the order of the rest.
    ///
    /// Returns whether anything was removed.
    pub fn remove_party(&mut self, id: &Id) -> bool {
        match self.parties.iter().position(|p| &p.id == id) {
            Some(pos) => {
                self.parties.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether `ttl` or more has passed since the last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Ok(ttl) = TimeDelta::from_std(ttl) else {
            return false;
        };
        now.signed_duration_since(self.last_active) >= ttl
    }

    /// Active and not expired: the session can be joined.
    pub fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.active && !self.is_expired(now, ttl)
    }
}

/// Partial update of a session.
///
/// Each field that is `Some` replaces the stored field wholesale; `None`
/// leaves it untouched. `parties` replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_params: Option<TerminalParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parties: Option<Vec<Party>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

impl UpdateRequest {
    /// An empty patch for session `id`.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            active: None,
            terminal_params: None,
            parties: None,
            last_active: None,
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn terminal_params(mut self, params: TerminalParams) -> Self {
        self.terminal_params = Some(params);
        self
    }

    pub fn parties(mut self, parties: Vec<Party>) -> Self {
        self.parties = Some(parties);
        self
    }

    pub fn last_active(mut self, at: DateTime<Utc>) -> Self {
        self.last_active = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
            && self.terminal_params.is_none()
            && self.parties.is_none()
            && self.last_active.is_none()
    }

    pub fn check(&self) -> RegistryResult<()> {
        self.id.check()?;
        if let Some(params) = &self.terminal_params {
            params.check()?;
        }
        if let Some(parties) = &self.parties {
            check_parties(parties)?;
        }
        Ok(())
    }

    /// Apply the patch to `session` field by field.
    pub fn apply(self, session: &mut Session) {
        if let Some(active) = self.active {
            session.active = active;
        }
        if let Some(params) = self.terminal_params {
            session.terminal_params = params;
        }
        if let Some(parties) = self.parties {
            session.parties = parties;
        }
        if let Some(at) = self.last_active {
            session.last_active = at;
        }
    }
}

fn check_parties(parties: &[Party]) -> RegistryResult<()> {
    let mut seen = HashSet::with_capacity(parties.len());
    for party in parties {
        party.id.check()?;
        if !seen.insert(&party.id) {
            return Err(RegistryError::BadParameter(format!("duplicate party {}", party.id)));
        }
    }
    Ok(())
}
