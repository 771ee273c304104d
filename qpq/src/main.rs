mod cli;
mod config;
mod domain;
mod exec;
mod history;
mod logging;
mod search;
mod shell;
mod store;
mod template;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    logging::init_logging(cli.verbose);
    cli::run(cli)
}
