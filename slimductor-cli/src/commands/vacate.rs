//! `slimductor vacate`: orchestrator → vacating, ahead of a handover.

use anyhow::{Context, Result};
use clap::Args;

use slimductor_core::Role;

use super::{open_registry, SessionArgs};

#[derive(Args, Debug)]
pub struct VacateArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

impl VacateArgs {
    pub fn run(self) -> Result<()> {
        let session_id = self.session.session_id();
        let entry = open_registry()?
            .set_role(&session_id, Role::Vacating)
            .with_context(|| format!("failed to vacate session '{session_id}'"))?;

        if entry.role == Role::Vacating {
            println!(
                "✓ '{}' is vacating {}; a successor may register with --role orchestrator",
                entry.session_id,
                entry.cwd.display()
            );
        } else {
            println!(
                "'{}' stays {}: another session is orchestrator of {}",
                entry.session_id,
                entry.role,
                entry.cwd.display()
            );
        }
        Ok(())
    }
}
