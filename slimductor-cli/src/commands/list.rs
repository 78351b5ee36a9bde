//! `slimductor list`: machine-readable dump of live sessions.

use anyhow::{Context, Result};
use clap::Args;

use super::open_registry;

#[derive(Args, Debug)]
pub struct ListArgs {}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let sessions = open_registry()?
            .list()
            .context("failed to list sessions")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&sessions).context("failed to serialize sessions")?
        );
        Ok(())
    }
}
