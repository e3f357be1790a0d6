use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loads RDF data and runs SPARQL queries against a quadstore database file.
#[derive(Debug, Parser)]
#[command(name = "quadstore", version, about)]
pub struct Cli {
    /// Path to the quadstore SQLite database file (created if it doesn't exist).
    #[arg(long, short = 's', global = true, default_value = "quadstore.sqlite3")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Loads an N-Triples file into an ontology, creating it if it doesn't already exist.
    Load {
        /// Path to the N-Triples file to load.
        file: PathBuf,
        /// IRI of the ontology (named graph) to load into.
        #[arg(long)]
        graph: String,
    },
    /// Runs a SPARQL SELECT query read from a file and writes its results in the given format.
    Query {
        /// Path to a file containing the SPARQL query text.
        file: PathBuf,
        /// Output encoding: csv, tsv, json, or xml.
        #[arg(long, default_value = "csv")]
        format: String,
        /// Ontology IRI to scope the query to; scopes over every registered ontology if omitted.
        #[arg(long)]
        graph: Option<String>,
    },
    /// Lists every registered ontology and its last-update counter.
    Ontologies,
}
