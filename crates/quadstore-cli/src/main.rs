//! `quadstore` CLI: load ontologies, run SPARQL queries against a store file, and list what's
//! registered (SPEC_FULL.md §6), scaled down from the teacher's `oxigraph` CLI's subcommand shape.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = quadstore::Store::open(quadstore::Config::new().path(&cli.store))?;

    match cli.command {
        Command::Load { file, graph } => commands::load(&store, &file, &graph),
        Command::Query { file, format, graph } => commands::query(&store, &file, &format, &graph),
        Command::Ontologies => commands::ontologies(&store),
    }
}
