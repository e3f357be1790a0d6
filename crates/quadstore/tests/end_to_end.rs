//! End-to-end seed scenarios from spec.md §8, driven entirely through the public `Store` facade
//! (parse → normalize → compile → execute, wired together by `quadstore-compiler`'s entry points).

use quadstore::{Config, Store};
use quadstore_results::ResolvedTerm;
use std::collections::BTreeSet;

const EX: &str = "PREFIX ex: <http://example.org/> ";

fn open() -> Store {
    Store::open(Config::new().in_memory()).expect("open in-memory store")
}

fn iris(store: &Store, sparql: &str, var: &str, graph: &[quadstore::Storid]) -> BTreeSet<String> {
    store
        .sparql_resolved(sparql, graph)
        .expect("query failed")
        .into_iter()
        .filter_map(|row| match row.get(var) {
            Some(ResolvedTerm::Iri(iri)) => Some(iri.clone()),
            _ => None,
        })
        .collect()
}

fn set(iris: &[&str]) -> BTreeSet<String> {
    iris.iter().map(|s| format!("http://example.org/{s}")).collect()
}

#[test]
fn scenario_1_triple_insertion_and_read_back() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store.update(&onto, &format!("{EX} INSERT DATA {{ ex:a a ex:A }}"), &[onto.graph()]).unwrap();
    let xs = iris(&store, &format!("{EX} SELECT ?x WHERE {{ ?x a ex:A }}"), "x", &[onto.graph()]);
    assert_eq!(xs, set(&["a"]));
}

#[test]
fn scenario_2_transitive_closure_over_subclassof() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store
        .update(
            &onto,
            &format!(
                "{EX} INSERT DATA {{
                    ex:A1 rdfs:subClassOf ex:A .
                    ex:A11 rdfs:subClassOf ex:A1 .
                    ex:A2 rdfs:subClassOf ex:A .
                }}"
            ),
            &[onto.graph()],
        )
        .unwrap();
    let xs = iris(
        &store,
        &format!("{EX} SELECT ?x WHERE {{ ?x rdfs:subClassOf* ex:A }}"),
        "x",
        &[onto.graph()],
    );
    assert_eq!(xs, set(&["A", "A1", "A11", "A2"]));
}

#[test]
fn scenario_3_language_tagged_filter() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store
        .update(
            &onto,
            &format!(
                "{EX} INSERT DATA {{
                    ex:b1 rdfs:label \"label_b\"@en .
                    ex:b2 rdfs:label \"label_b\"@en .
                    ex:b3 rdfs:label \"label_b\"@fr .
                }}"
            ),
            &[onto.graph()],
        )
        .unwrap();
    let xs = iris(
        &store,
        &format!("{EX} SELECT ?x WHERE {{ ?x rdfs:label \"label_b\"@en }}"),
        "x",
        &[onto.graph()],
    );
    assert_eq!(xs, set(&["b1", "b2"]));
}

#[test]
fn scenario_4_optional_leaves_unbound_variable_missing() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store
        .update(
            &onto,
            &format!(
                "{EX} INSERT DATA {{
                    ex:b1 a ex:B .
                    ex:b2 a ex:B .
                    ex:b2 rdfs:label \"b2\" .
                }}"
            ),
            &[onto.graph()],
        )
        .unwrap();
    let rows = store
        .sparql_resolved(
            &format!("{EX} SELECT ?x ?l WHERE {{ ?x a ex:B . OPTIONAL {{ ?x rdfs:label ?l }} }}"),
            &[onto.graph()],
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    let without_label = rows.iter().filter(|row| !row.contains_key("l")).count();
    assert_eq!(without_label, 1);
}

#[test]
fn scenario_5_group_by_having() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store
        .update(
            &onto,
            &format!(
                "{EX} INSERT DATA {{
                    ex:s1 ex:rel ex:y1 .
                    ex:s1 ex:rel ex:y2 .
                    ex:s2 ex:rel ex:y1 .
                }}"
            ),
            &[onto.graph()],
        )
        .unwrap();
    let xs = iris(
        &store,
        &format!("{EX} SELECT ?x (COUNT(?y) AS ?n) WHERE {{ ?x ex:rel ?y }} GROUP BY ?x HAVING (COUNT(?y) > 1)"),
        "x",
        &[onto.graph()],
    );
    assert_eq!(xs, set(&["s1"]));
}

#[test]
fn scenario_6_static_closure_is_cached_and_invalidated_on_write() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    store
        .update(&onto, &format!("{EX} INSERT DATA {{ ex:A1 rdfs:subClassOf ex:A }}"), &[onto.graph()])
        .unwrap();

    let query = format!("{EX} SELECT ?c WHERE {{ ?c rdfs:subClassOf*STATIC ex:A }}");
    let first = store.prepare_sparql(&query, &[onto.graph()]).unwrap();
    let second = store.prepare_sparql(&query, &[onto.graph()]).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second), "identical (source, graph_scope) should hit the cache");

    store
        .update(&onto, &format!("{EX} INSERT DATA {{ ex:A11 rdfs:subClassOf ex:A1 }}"), &[onto.graph()])
        .unwrap();
    let xs = iris(&store, &query, "c", &[onto.graph()]);
    assert_eq!(xs, set(&["A1", "A11"]), "inserting under rdfs:subClassOf must recompute the *STATIC closure");
}

#[test]
fn round_trip_ntriples_load_preserves_the_quad_count() {
    let store = open();
    let onto = store.create_ontology("http://example.org/onto").unwrap();
    let text = "<http://example.org/s> <http://example.org/p> <http://example.org/o> .\n\
                <http://example.org/s> <http://example.org/p> \"42\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n";
    let n = store.load_ntriples(&onto, text).unwrap();
    assert_eq!(n, 2);
    let rows = store
        .sparql("SELECT ?o WHERE { <http://example.org/s> <http://example.org/p> ?o }", &[onto.graph()])
        .unwrap();
    assert_eq!(rows.len(), 2);
}
