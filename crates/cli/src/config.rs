//! Command-line configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use corelib::LocatorConfig;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "ring-inspect")]
#[command(about = "Inspect consistent-hash routing decisions", long_about = None)]
pub struct CliConfig {
    /// Locator settings as JSON (`repetitions`, `hash`, `max_group_size`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Settings from `--config`, or the defaults.
    pub fn locator_config(&self) -> Result<LocatorConfig> {
        let Some(path) = &self.config else {
            return Ok(LocatorConfig::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = LocatorConfig::from_json(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded locator config");
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.locator_config()?;
        let result = self.command.execute(&config)?;
        println!("{}", result);
        Ok(())
    }
}
