//! Orchestrator election for one project domain.
//!
//! Pure functions over the *live* entries of the registry; reaping happens
//! before these are called. A domain is the exact `cwd` path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{Role, SessionEntry, SessionId};

/// Occupancy of a domain's orchestrator slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    NoOrchestrator,
    /// `vacating` is true when the only holder has announced a handover.
    HasOrchestrator { vacating: bool },
}

impl DomainState {
    pub fn observe<'a>(peers: impl IntoIterator<Item = &'a SessionEntry>) -> Self {
        let mut state = DomainState::NoOrchestrator;
        for entry in peers {
            match entry.role {
                Role::Orchestrator => return DomainState::HasOrchestrator { vacating: false },
                Role::Vacating => state = DomainState::HasOrchestrator { vacating: true },
                Role::Worker => {}
            }
        }
        state
    }
}

/// Role `session_id` should adopt when registering in `cwd`.
///
/// The session's own previous entry is ignored so that re-registering is
/// idempotent. An explicit `desired` role is honored unless another live
/// session holds the slot as `orchestrator`; a `vacating` holder can be
/// superseded that way, but a plain registration beside it becomes a worker.
pub fn determine_role<'a>(
    session_id: &SessionId,
    cwd: &Path,
    live: impl IntoIterator<Item = &'a SessionEntry>,
    desired: Option<Role>,
) -> Role {
    let peers = live
        .into_iter()
        .filter(|e| e.session_id != *session_id && e.in_domain(cwd));

    match (DomainState::observe(peers), desired) {
        (DomainState::HasOrchestrator { vacating: false }, _) => Role::Worker,
        (_, Some(role)) => role,
        (DomainState::NoOrchestrator, None) => Role::Orchestrator,
        (DomainState::HasOrchestrator { vacating: true }, None) => Role::Worker,
    }
}

/// Domains with more than one live `orchestrator` entry, sorted by path.
///
/// Two sessions registering in the same instant can both win the election;
/// this only reports it.
pub fn contested_domains<'a>(live: impl IntoIterator<Item = &'a SessionEntry>) -> Vec<PathBuf> {
    let mut counts = BTreeMap::<&Path, usize>::new();
    for entry in live {
        if entry.role == Role::Orchestrator {
            *counts.entry(entry.cwd.as_path()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(cwd, _)| cwd.to_path_buf())
        .collect()
}
