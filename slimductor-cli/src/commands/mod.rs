pub mod check;
pub mod deregister;
pub mod list;
pub mod register;
pub mod vacate;

use anyhow::{Context, Result};
use clap::Args;

use slimductor_core::{identity, DirStore, OsLiveness, Registry, SessionId};

/// Identifies the calling session. Defaults mirror what a lifecycle hook sees.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Session id. Defaults to $CLAUDE_SESSION_ID, then `pid-<pid>`.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Process to track for liveness. Defaults to the parent process.
    #[arg(long)]
    pub pid: Option<u32>,
}

impl SessionArgs {
    pub fn pid(&self) -> u32 {
        self.pid.unwrap_or_else(identity::tracking_pid)
    }

    pub fn session_id(&self) -> SessionId {
        identity::resolve_session_id(self.session_id.clone(), self.pid())
    }
}

/// Registry for the current user's home directory.
pub fn open_registry() -> Result<Registry<DirStore, OsLiveness>> {
    let registry = Registry::open().context("failed to open session registry")?;
    tracing::debug!(dir = %registry.store().dir().display(), "opened session registry");
    Ok(registry)
}
