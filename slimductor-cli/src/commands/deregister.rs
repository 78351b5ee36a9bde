//! `slimductor deregister`

use anyhow::{Context, Result};
use clap::Args;

use super::{open_registry, SessionArgs};

#[derive(Args, Debug)]
pub struct DeregisterArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

impl DeregisterArgs {
    pub fn run(self) -> Result<()> {
        let session_id = self.session.session_id();
        open_registry()?
            .deregister(&session_id)
            .with_context(|| format!("failed to deregister session '{session_id}'"))?;
        println!("✓ Deregistered '{session_id}'");
        Ok(())
    }
}
