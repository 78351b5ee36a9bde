//! `slimductor register [--role R] [--cwd PATH]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use slimductor_core::{identity, Registration, Role};

use super::{open_registry, SessionArgs};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Requested role: orchestrator | worker | vacating. Honored only when no
    /// other live orchestrator holds the domain.
    #[arg(long, value_name = "ROLE")]
    pub role: Option<Role>,

    /// Project domain. Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Print the written entry as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RegisterArgs {
    pub fn run(self) -> Result<()> {
        let cwd = identity::resolve_domain(self.cwd.as_deref())
            .context("cannot resolve project directory")?;
        let session_id = self.session.session_id();
        let registration =
            Registration::new(session_id.clone(), self.session.pid(), cwd).with_role(self.role);

        let registry = open_registry()?;
        let entry = registry
            .register(registration)
            .with_context(|| format!("failed to register session '{session_id}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&entry).context("failed to serialize entry")?
            );
            return Ok(());
        }

        println!(
            "✓ Registered '{}' as {} (PID {}) in {}",
            entry.session_id,
            entry.role,
            entry.pid,
            entry.cwd.display()
        );
        if self.role.is_some_and(|wanted| wanted != entry.role) {
            println!("  Requested role not granted: another session holds the orchestrator slot.");
        }
        Ok(())
    }
}
