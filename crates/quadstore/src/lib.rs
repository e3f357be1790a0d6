//! Facade crate (SPEC_FULL.md §4.10): ties `quadstore-store`, `quadstore-sparql`, and
//! `quadstore-compiler` together behind a single `Store`/`Ontology` API, a hand-rolled pool of
//! read connections, and a prepared-query cache shared across callers.

mod config;
mod error;
mod ontology;
mod pool;
mod store;

pub use config::{Config, Storage};
pub use error::{QuadstoreError, QuadstoreResult};
pub use ontology::Ontology;
pub use store::Store;

pub use quadstore_compiler::{PreparedQuery, QuerySolution, UpdateSummary};
pub use quadstore_model::Storid;

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> Store {
        Store::open(Config::new().in_memory()).expect("open in-memory store")
    }

    #[test]
    fn creating_the_same_ontology_twice_is_idempotent() {
        let store = open_memory();
        let a = store.create_ontology("http://example.org/onto").unwrap();
        let b = store.create_ontology("http://example.org/onto").unwrap();
        assert_eq!(a.graph(), b.graph());
    }

    #[test]
    fn unknown_ontology_lookup_returns_none() {
        let store = open_memory();
        assert!(store.ontology("http://example.org/does-not-exist").unwrap().is_none());
    }

    #[test]
    fn update_then_select_sees_the_inserted_triple() {
        let store = open_memory();
        let onto = store.create_ontology("http://example.org/onto").unwrap();
        store
            .update(
                &onto,
                "INSERT DATA { <http://example.org/s> <http://example.org/p> <http://example.org/o> }",
                &[onto.graph()],
            )
            .unwrap();
        let rows = store
            .sparql(
                "SELECT ?o WHERE { <http://example.org/s> <http://example.org/p> ?o }",
                &[onto.graph()],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn execute_many_refuses_to_run_while_the_store_is_dirty() {
        let store = open_memory();
        let onto = store.create_ontology("http://example.org/onto").unwrap();
        store
            .update(
                &onto,
                "INSERT DATA { <http://example.org/s> <http://example.org/p> <http://example.org/o> }",
                &[onto.graph()],
            )
            .unwrap();
        // `update` clears the dirty flag on commit, so a second round-trip should succeed.
        let results = store
            .execute_many(&[("SELECT ?o WHERE { ?s ?p ?o }", vec![onto.graph()])])
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn merging_an_ontology_moves_its_quads_to_the_target() {
        let store = open_memory();
        let src = store.create_ontology("http://example.org/src").unwrap();
        let dst = store.create_ontology("http://example.org/dst").unwrap();
        store
            .update(
                &src,
                "INSERT DATA { <http://example.org/s> <http://example.org/p> <http://example.org/o> }",
                &[src.graph()],
            )
            .unwrap();
        store.merge_ontologies(&src, &dst).unwrap();
        let rows = store
            .sparql("SELECT ?o WHERE { ?s ?p ?o }", &[dst.graph()])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(store.ontology("http://example.org/src").unwrap().is_none());
    }
}
