//! SPARQL 1.1 Query Results TSV Format (<https://www.w3.org/TR/sparql11-results-csv-tsv/>).
//!
//! Unlike CSV, TSV keeps full term fidelity: IRIs are angle-bracketed, literals carry their
//! datatype/language suffix, Turtle-style.

use crate::error::ResultsResult;
use crate::resolved::{ResolvedTerm, TermResolver};
use quadstore_compiler::QuerySolution;
use std::io::Write;

pub fn write_tsv(out: &mut impl Write, vars: &[String], rows: &[QuerySolution], resolver: &TermResolver<'_>) -> ResultsResult<()> {
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(out, "\t")?;
        }
        write!(out, "?{v}")?;
    }
    writeln!(out)?;

    for row in rows {
        for (i, var) in vars.iter().enumerate() {
            if i > 0 {
                write!(out, "\t")?;
            }
            if let Some(term) = row.get(var) {
                write!(out, "{}", turtle_term(resolver.resolve(term)?))?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn turtle_term(term: ResolvedTerm) -> String {
    match term {
        ResolvedTerm::Iri(iri) => format!("<{iri}>"),
        ResolvedTerm::BlankNode(label) => format!("_:{label}"),
        ResolvedTerm::Literal { lexical, datatype_iri, lang } => {
            let quoted = format!("\"{}\"", escape_literal(&lexical));
            if let Some(lang) = lang {
                format!("{quoted}@{lang}")
            } else if let Some(dt) = datatype_iri {
                format!("{quoted}^^<{dt}>")
            } else {
                quoted
            }
        }
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\t', "\\t").replace('\n', "\\n").replace('\r', "\\r")
}
