use anyhow::Result;
use clap::Parser;

use worldkeep_cli::cli::{Cli, run};
use worldkeep_cli::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    run(&cli)?;
    Ok(())
}
