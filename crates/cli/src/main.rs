//! `ring-inspect` entry point.

use clap::Parser;
use cli::CliConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config = CliConfig::parse();
    config.run()
}
