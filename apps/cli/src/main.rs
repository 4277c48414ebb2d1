//! probank CLI: splits typeset competition-problem documents into a
//! numbered problem corpus.
//!
//! Extracts problems with their citations, answers and solutions, then
//! bundles them into per-problem JSON records.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
