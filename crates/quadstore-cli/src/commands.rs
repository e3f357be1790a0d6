use anyhow::{bail, Context};
use quadstore::{Storid, Store};
use quadstore_results::ResultFormat;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn load(store: &Store, file: &Path, graph: &str) -> anyhow::Result<()> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let ontology = store.create_ontology(graph)?;
    let count = store.load_ntriples(&ontology, &text)?;
    println!("loaded {count} statements into {graph}");
    Ok(())
}

pub fn query(store: &Store, file: &Path, format: &str, graph: &Option<String>) -> anyhow::Result<()> {
    let sparql = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let format = ResultFormat::parse(format).with_context(|| format!("unknown result format {format:?}"))?;
    let scope = graph_scope(store, graph)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    store.sparql_write(&mut out, format, &sparql, &scope)?;
    out.flush()?;
    Ok(())
}

pub fn ontologies(store: &Store) -> anyhow::Result<()> {
    for (iri, last_update) in store.list_ontologies()? {
        println!("{iri}\tlast_update={last_update}");
    }
    Ok(())
}

/// Resolves `--graph` to a single-element scope, or falls back to every registered ontology.
fn graph_scope(store: &Store, graph: &Option<String>) -> anyhow::Result<Vec<Storid>> {
    if let Some(iri) = graph {
        let ontology = store
            .ontology(iri)?
            .with_context(|| format!("no ontology registered under IRI {iri:?}"))?;
        return Ok(vec![ontology.graph()]);
    }
    let mut scope = Vec::new();
    for (iri, _) in store.list_ontologies()? {
        match store.ontology(&iri)? {
            Some(ontology) => scope.push(ontology.graph()),
            None => bail!("ontology {iri:?} listed but vanished before its graph id could be resolved"),
        }
    }
    Ok(scope)
}
