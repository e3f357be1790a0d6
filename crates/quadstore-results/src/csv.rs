//! SPARQL 1.1 Query Results CSV Format (<https://www.w3.org/TR/sparql11-results-csv-tsv/>).

use crate::error::ResultsResult;
use crate::resolved::{ResolvedTerm, TermResolver};
use quadstore_compiler::QuerySolution;
use std::io::Write;

pub fn write_csv(out: &mut impl Write, vars: &[String], rows: &[QuerySolution], resolver: &TermResolver<'_>) -> ResultsResult<()> {
    write_header(out, vars, ',')?;
    for row in rows {
        let mut first = true;
        for var in vars {
            if !first {
                write!(out, ",")?;
            }
            first = false;
            if let Some(term) = row.get(var) {
                write!(out, "{}", escape_csv(&plain_text(resolver.resolve(term)?)))?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_header(out: &mut impl Write, vars: &[String], sep: char) -> ResultsResult<()> {
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(out, "{sep}")?;
        }
        write!(out, "{v}")?;
    }
    writeln!(out)?;
    Ok(())
}

/// The CSV format has no way to distinguish an IRI from a literal or a blank node except by
/// convention: IRIs are written bare, blank nodes as `_:label`, literals as their lexical form
/// (datatype/language are lost, per the W3C format's own stated limitation).
pub(crate) fn plain_text(term: ResolvedTerm) -> String {
    match term {
        ResolvedTerm::Iri(iri) => iri,
        ResolvedTerm::BlankNode(label) => format!("_:{label}"),
        ResolvedTerm::Literal { lexical, .. } => lexical,
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
