//! Session and party identifiers.
//!
//! An `Id` is the canonical hyphenated form of a random (v4) UUID, e.g.
//! `5f0c2a4e-8d1b-4c3e-9a7f-1b2c3d4e5f60`. IDs minted here or obtained via
//! [`Id::parse`] are always valid; IDs deserialized from the outside world
//! are not validated until [`Id::check`] runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};

/// Length of the canonical hyphenated UUID form.
const CANONICAL_LEN: usize = 36;

/// Unique identifier of a session or a party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Parse and validate an identifier.
    pub fn parse(s: &str) -> RegistryResult<Self> {
        let uuid = parse_canonical(s)?;
        Ok(Self(uuid.hyphenated().to_string()))
    }

    /// Validate an already-constructed identifier.
    ///
    /// Unlike [`Id::parse`] this does not normalize: an uppercase or
    /// mixed-case UUID names a different backend key, so it is rejected.
    pub fn check(&self) -> RegistryResult<()> {
        let uuid = parse_canonical(&self.0)?;
        if uuid.hyphenated().to_string() != self.0 {
            return Err(RegistryError::InvalidFormat(format!(
                "id {:?}: not in canonical lowercase form",
                self.0
            )));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn parse_canonical(s: &str) -> RegistryResult<Uuid> {
    if s.trim().is_empty() {
        return Err(RegistryError::InvalidFormat("empty id".into()));
    }
    // uuid also accepts the simple, braced and urn forms; only the
    // hyphenated one is canonical here.
    if s.len() != CANONICAL_LEN {
        return Err(RegistryError::InvalidFormat(format!(
            "id {s:?}: expected {CANONICAL_LEN} characters, got {}",
            s.len()
        )));
    }
    Uuid::try_parse(s).map_err(|e| RegistryError::InvalidFormat(format!("id {s:?}: {e}")))
}
