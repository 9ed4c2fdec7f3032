//! Transmute CLI: run a migration, check step resolution, or print the merged settings.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use transmute::engine::arg_parser::Cli;
use transmute::engine::handle_command;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_command(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
