//! Domain types for the session registry.
//!
//! The on-disk entry format is a compatibility surface shared with hook
//! scripts and human tooling: keys are `pid`, `startedAt`, `sessionId`,
//! `cwd` and `role`, and `role` is one of `orchestrator`, `worker`,
//! `vacating`. Nothing else is accepted on read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, registry-wide unique session identifier assigned by the host
/// application. Doubles as the entry's file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Reject ids that cannot be used verbatim as a file stem.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let id = self.0.as_str();
        let bad = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0']);
        if bad {
            return Err(RegistryError::InvalidSessionId {
                session_id: id.to_owned(),
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Role a session holds within its project domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The one session coordinating the domain.
    Orchestrator,
    Worker,
    /// An orchestrator that announced a handover but still holds the slot.
    Vacating,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Orchestrator, Role::Worker, Role::Vacating];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Orchestrator => "orchestrator",
            Role::Worker => "worker",
            Role::Vacating => "vacating",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orchestrator" => Ok(Role::Orchestrator),
            "worker" => Ok(Role::Worker),
            "vacating" => Ok(Role::Vacating),
            other => Err(format!(
                "unknown role '{other}'; expected: orchestrator, worker, vacating"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One session's registration, stored as `<sessionId>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionEntry {
    /// Process used for liveness checks only.
    pub pid: u32,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    pub session_id: SessionId,
    /// Absolute path of the project domain.
    pub cwd: PathBuf,
    pub role: Role,
}

impl SessionEntry {
    pub fn in_domain(&self, cwd: &Path) -> bool {
        self.cwd == cwd
    }

    /// Human-readable summary line: `[role] PID <pid> <cwd>`.
    pub fn summary_line(&self) -> String {
        format!("[{}] PID {} {}", self.role, self.pid, self.cwd.display())
    }
}

/// `startedAt` is written as whole-second UTC (`2024-05-01T09:30:00Z`) and
/// read as any RFC 3339 timestamp.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
