mod cli;
mod config;
mod logging;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use dedup_engine::EngineHandle;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, engine_logging::parse_level(&cli.log_level));

    let engine_config = config::load_engine_config(cli.config.as_deref());
    let engine = EngineHandle::new(engine_config).context("starting dedup engine")?;

    let report = runner::run(&engine, &cli.command, &cli.out_dir)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
