//! Generation identifiers.
//!
//! A [`GenerationId`] tags one orchestrated generation call in logs, so the
//! retries and failover attempts it causes can be read back together.
//! It wraps a ULID and therefore sorts by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

const PREFIX: &str = "gen_";

/// Identifier of one generation call. Displayed as `gen_<ulid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(Ulid);

impl GenerationId {
    /// Creates a new id stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// The underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

/// A string that is not a generation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub input: String,
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid generation id '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for GenerationId {
    type Err = ParseIdError;

    /// Accepts both `gen_<ulid>` and a bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        raw.parse::<Ulid>().map(Self).map_err(|e| ParseIdError {
            input: s.to_string(),
            reason: e.to_string(),
        })
    }
}
