//! SPARQL 1.1 Query Results JSON Format (<https://www.w3.org/TR/sparql11-results-json/>).

use crate::error::ResultsResult;
use crate::resolved::{ResolvedTerm, TermResolver};
use quadstore_compiler::QuerySolution;
use serde_json::{json, Map, Value};
use std::io::Write;

pub fn write_json(out: &mut impl Write, vars: &[String], rows: &[QuerySolution], resolver: &TermResolver<'_>) -> ResultsResult<()> {
    let mut bindings = Vec::with_capacity(rows.len());
    for row in rows {
        let mut obj = Map::new();
        for var in vars {
            if let Some(term) = row.get(var) {
                obj.insert(var.clone(), term_to_json(resolver.resolve(term)?));
            }
        }
        bindings.push(Value::Object(obj));
    }
    let doc = json!({
        "head": { "vars": vars },
        "results": { "bindings": bindings },
    });
    serde_json::to_writer(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

fn term_to_json(term: ResolvedTerm) -> Value {
    match term {
        ResolvedTerm::Iri(iri) => json!({ "type": "uri", "value": iri }),
        ResolvedTerm::BlankNode(label) => json!({ "type": "bnode", "value": label }),
        ResolvedTerm::Literal { lexical, datatype_iri, lang } => {
            let mut obj = Map::new();
            obj.insert("type".to_string(), Value::String("literal".to_string()));
            obj.insert("value".to_string(), Value::String(lexical));
            if let Some(lang) = lang {
                obj.insert("xml:lang".to_string(), Value::String(lang));
            } else if let Some(dt) = datatype_iri {
                obj.insert("datatype".to_string(), Value::String(dt));
            }
            Value::Object(obj)
        }
    }
}
