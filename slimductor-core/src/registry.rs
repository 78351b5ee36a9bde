//! The session registry: every live session across all project domains.
//!
//! # API pattern
//!
//! [`Registry`] is generic over its [`EntryStore`] and [`LivenessOracle`] so
//! tests can run against [`crate::store::MemoryStore`] and a closure. The
//! production binding is [`Registry::open_at`] (explicit home, used in tests
//! with `TempDir`) and [`Registry::open`] (derives home from
//! `dirs::home_dir()`).
//!
//! Every operation starts with a reaping scan, so a crashed session's entry
//! disappears the next time anyone looks.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

use crate::config;
use crate::error::RegistryError;
use crate::liveness::{LivenessOracle, OsLiveness};
use crate::role::{contested_domains, determine_role};
use crate::store::{DirStore, EntryStore};
use crate::types::{Role, SessionEntry, SessionId};

/// A request to join the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub session_id: SessionId,
    pub pid: u32,
    /// Absolute project domain path.
    pub cwd: PathBuf,
    /// Explicit role (handover takeover); honored only if no live orchestrator holds the domain.
    pub desired_role: Option<Role>,
}

impl Registration {
    pub fn new(session_id: impl Into<SessionId>, pid: u32, cwd: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            pid,
            cwd: cwd.into(),
            desired_role: None,
        }
    }

    pub fn with_role(mut self, role: Option<Role>) -> Self {
        self.desired_role = role;
        self
    }
}

/// Result of [`Registry::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_active: usize,
    pub orchestrator_count: usize,
    pub roles: BTreeMap<Role, usize>,
    /// Domains where more than one live session claims `orchestrator`.
    pub contested: Vec<PathBuf>,
    pub sessions: Vec<SessionEntry>,
}

impl Summary {
    pub fn from_live(sessions: Vec<SessionEntry>) -> Self {
        let mut roles: BTreeMap<Role, usize> = Role::ALL.iter().map(|r| (*r, 0)).collect();
        for entry in &sessions {
            *roles.entry(entry.role).or_default() += 1;
        }
        Self {
            total_active: sessions.len(),
            orchestrator_count: roles[&Role::Orchestrator],
            contested: contested_domains(&sessions),
            roles,
            sessions,
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "{} active session(s), {} orchestrator(s)",
            self.total_active, self.orchestrator_count
        )
    }

    /// Body rows under the headline: sessions first, then contested domains.
    pub fn rows(&self) -> impl Iterator<Item = SummaryRow<'_>> {
        self.sessions
            .iter()
            .map(SummaryRow::Session)
            .chain(self.contested.iter().map(|cwd| SummaryRow::Contested(cwd.as_path())))
    }
}

/// One row of the human-readable summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryRow<'a> {
    Session(&'a SessionEntry),
    Contested(&'a Path),
}

impl fmt::Display for SummaryRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryRow::Session(entry) => f.write_str(&entry.summary_line()),
            SummaryRow::Contested(cwd) => write!(
                f,
                "contested domain: {} has multiple orchestrators",
                cwd.display()
            ),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline())?;
        for row in self.rows() {
            writeln!(f, "  {row}")?;
        }
        Ok(())
    }
}

/// Registry over an entry store and a liveness oracle.
#[derive(Debug, Clone)]
pub struct Registry<S, L> {
    store: S,
    liveness: L,
    max_age: Option<Duration>,
}

impl Registry<DirStore, OsLiveness> {
    /// Production registry for `home`, honoring `<home>/.claude/slimductor.yaml`.
    pub fn open_at(home: &Path) -> Result<Self, RegistryError> {
        let cfg = config::load_at(home)?;
        let store = DirStore::new(cfg.registry_dir(home));
        Ok(Registry::new(store, OsLiveness).with_max_age(cfg.max_age()))
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, RegistryError> {
        Self::open_at(&config::home()?)
    }
}

impl<S: EntryStore, L: LivenessOracle> Registry<S, L> {
    pub fn new(store: S, liveness: L) -> Self {
        Self {
            store,
            liveness,
            max_age: None,
        }
    }

    /// Additionally treat entries older than `max_age` as stale.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -----------------------------------------------------------------------
    // 1. Reaping
    // -----------------------------------------------------------------------

    /// Delete every stale entry and return the live ones, sorted by session id.
    pub fn reap(&self) -> Result<Vec<SessionEntry>, RegistryError> {
        let now = Utc::now();
        let mut live = Vec::new();
        for item in self.store.list_all()? {
            let (key, entry) = item?;
            if self.is_stale(&entry, now) {
                self.store.delete(&key)?;
                tracing::info!(
                    session = %key,
                    pid = entry.pid,
                    cwd = %entry.cwd.display(),
                    role = %entry.role,
                    "reaped stale session"
                );
            } else {
                live.push(entry);
            }
        }
        live.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(live)
    }

    fn is_stale(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        if !self.liveness.is_alive(entry.pid) {
            return true;
        }
        match self.max_age {
            Some(max_age) => now.signed_duration_since(entry.started_at) > max_age,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // 2. Membership
    // -----------------------------------------------------------------------

    /// Join (or refresh) the registry and return the written entry.
    ///
    /// Re-registering with the same pid keeps the first `startedAt`.
    pub fn register(&self, registration: Registration) -> Result<SessionEntry, RegistryError> {
        let Registration {
            session_id,
            pid,
            cwd,
            desired_role,
        } = registration;
        session_id.validate()?;

        let live = self.reap()?;
        let role = determine_role(&session_id, &cwd, &live, desired_role);
        let started_at = live
            .iter()
            .find(|e| e.session_id == session_id && e.pid == pid)
            .map(|e| e.started_at)
            .unwrap_or_else(|| Utc::now().trunc_subsecs(0));

        let entry = SessionEntry {
            pid,
            started_at,
            session_id,
            cwd,
            role,
        };
        self.store.write(&entry)?;
        tracing::info!(
            session = %entry.session_id,
            pid = entry.pid,
            cwd = %entry.cwd.display(),
            role = %entry.role,
            "registered session"
        );
        Ok(entry)
    }

    /// Remove the session's entry. Absent entries are not an error.
    pub fn deregister(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        self.store.delete(session_id)?;
        tracing::info!(session = %session_id, "deregistered session");
        Ok(())
    }

    /// Change the role of the caller's own entry in place.
    ///
    /// The election rules still apply: a session cannot promote itself past
    /// another live orchestrator, so the returned entry carries the role that
    /// was actually written.
    pub fn set_role(&self, session_id: &SessionId, role: Role) -> Result<SessionEntry, RegistryError> {
        session_id.validate()?;
        let live = self.reap()?;
        let mut entry = live
            .iter()
            .find(|e| e.session_id == *session_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered {
                session_id: session_id.0.clone(),
            })?;

        entry.role = determine_role(session_id, &entry.cwd, &live, Some(role));
        self.store.write(&entry)?;
        tracing::info!(session = %session_id, role = %entry.role, "changed session role");
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // 3. Queries
    // -----------------------------------------------------------------------

    /// Counts, role histogram and per-session lines. Never changes roles.
    pub fn check(&self) -> Result<Summary, RegistryError> {
        let summary = Summary::from_live(self.reap()?);
        for cwd in &summary.contested {
            tracing::warn!(cwd = %cwd.display(), "multiple live orchestrators in one domain");
        }
        Ok(summary)
    }

    /// All live entries, sorted by session id.
    pub fn list(&self) -> Result<Vec<SessionEntry>, RegistryError> {
        self.reap()
    }

    /// Live entries of one project domain.
    pub fn domain(&self, cwd: &Path) -> Result<Vec<SessionEntry>, RegistryError> {
        let mut live = self.reap()?;
        live.retain(|e| e.in_domain(cwd));
        Ok(live)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
