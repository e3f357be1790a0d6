//! W3C SPARQL-Results CSV/TSV/JSON/XML encoders (spec.md §4.8, §6 "Wire output encodings").
//!
//! Every encoder takes the already-decoded rows a [`quadstore_compiler::execute_select`] call
//! produced, plus a [`resolved::TermResolver`] to turn storid-based terms back into IRIs,
//! blank-node labels, and literal lexical forms/datatypes.

pub mod csv;
pub mod error;
pub mod json;
pub mod resolved;
pub mod tsv;
pub mod xml;

pub use error::{ResultsError, ResultsResult};
pub use resolved::{ResolvedTerm, TermResolver};

use quadstore_compiler::QuerySolution;
use std::io::Write;

/// The four formats spec.md §6 requires, selectable by the CLI/facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Csv,
    Tsv,
    Json,
    Xml,
}

impl ResultFormat {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

/// Writes a full solution set in the requested format.
pub fn write_results(
    out: &mut impl Write,
    format: ResultFormat,
    vars: &[String],
    rows: &[QuerySolution],
    resolver: &TermResolver<'_>,
) -> ResultsResult<()> {
    match format {
        ResultFormat::Csv => csv::write_csv(out, vars, rows, resolver),
        ResultFormat::Tsv => tsv::write_tsv(out, vars, rows, resolver),
        ResultFormat::Json => json::write_json(out, vars, rows, resolver),
        ResultFormat::Xml => xml::write_xml(out, vars, rows, resolver),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadstore_model::{DatatypeId, Literal, LiteralValue, Storid, Term};
    use quadstore_store::{schema::CREATE_SCHEMA, Abbreviator};
    use rusqlite::Connection;
    use std::collections::BTreeMap;

    fn fixture() -> (Connection, Abbreviator) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        let abbrev = Abbreviator::new();
        abbrev.bootstrap(&conn).unwrap();
        (conn, abbrev)
    }

    fn solution_with(var: &str, term: Term) -> QuerySolution {
        let mut s: QuerySolution = BTreeMap::new();
        s.insert(var.to_string(), term);
        s
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let (conn, abbrev) = fixture();
        let resolver = TermResolver::new(&conn, &abbrev);
        let rows = vec![solution_with(
            "x",
            Term::Literal(Literal::new(LiteralValue::Text("a,\"b\"".to_string()), DatatypeId::PLAIN)),
        )];
        let mut out = Vec::new();
        write_results(&mut out, ResultFormat::Csv, &["x".to_string()], &rows, &resolver).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "x\n\"a,\"\"b\"\"\"\n");
    }

    #[test]
    fn tsv_renders_typed_literals_turtle_style() {
        let (conn, abbrev) = fixture();
        let resolver = TermResolver::new(&conn, &abbrev);
        let rows = vec![solution_with(
            "n",
            Term::Literal(Literal::new(LiteralValue::Int(42), DatatypeId::xsd(quadstore_model::vocab::XSD_INTEGER))),
        )];
        let mut out = Vec::new();
        write_results(&mut out, ResultFormat::Tsv, &["n".to_string()], &rows, &resolver).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "?n\n\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>\n");
    }

    #[test]
    fn json_round_trips_an_iri_binding() {
        let (conn, abbrev) = fixture();
        let s = abbrev.abbreviate(&conn, "http://example.com/s").unwrap();
        let resolver = TermResolver::new(&conn, &abbrev);
        let rows = vec![solution_with("s", Term::Resource(s))];
        let mut out = Vec::new();
        write_results(&mut out, ResultFormat::Json, &["s".to_string()], &rows, &resolver).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["head"]["vars"][0], "s");
        assert_eq!(doc["results"]["bindings"][0]["s"]["type"], "uri");
        assert_eq!(doc["results"]["bindings"][0]["s"]["value"], "http://example.com/s");
    }

    #[test]
    fn xml_escapes_reserved_characters_in_literal_text() {
        let (conn, abbrev) = fixture();
        let resolver = TermResolver::new(&conn, &abbrev);
        let rows = vec![solution_with(
            "x",
            Term::Literal(Literal::new(LiteralValue::Text("<a> & <b>".to_string()), DatatypeId::PLAIN)),
        )];
        let mut out = Vec::new();
        write_results(&mut out, ResultFormat::Xml, &["x".to_string()], &rows, &resolver).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<literal>&lt;a&gt; &amp; &lt;b&gt;</literal>"));
    }

    #[test]
    fn unbound_variable_is_omitted_from_every_encoding() {
        let (conn, abbrev) = fixture();
        let resolver = TermResolver::new(&conn, &abbrev);
        let rows = vec![BTreeMap::new()];
        let mut out = Vec::new();
        write_results(&mut out, ResultFormat::Csv, &["x".to_string()], &rows, &resolver).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "x\n\n");
    }

    #[test]
    fn blank_node_labels_are_stable_within_a_result_set() {
        let (conn, abbrev) = fixture();
        let b = abbrev.new_blank_node(&conn).unwrap();
        let resolver = TermResolver::new(&conn, &abbrev);
        let a = resolver.resolve(&Term::BlankNode(b)).unwrap();
        let c = resolver.resolve(&Term::BlankNode(b)).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn unknown_storid_in_the_vocab_constant_is_still_a_valid_iri() {
        let (conn, abbrev) = fixture();
        let resolver = TermResolver::new(&conn, &abbrev);
        let resolved = resolver.resolve(&Term::Resource(Storid(quadstore_model::vocab::RDF_TYPE.get()))).unwrap();
        assert_eq!(resolved, ResolvedTerm::Iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string()));
    }
}
