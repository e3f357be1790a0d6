//! SPARQL 1.1 Query Results XML Format (<https://www.w3.org/TR/rdf-sparql-XMLres/>), hand-rolled
//! over `std::io::Write` rather than pulling in a full XML writer crate: our output shape is
//! fixed and small (head/variable, results/result/binding), so a generic streaming writer buys
//! nothing.

use crate::error::ResultsResult;
use crate::resolved::{ResolvedTerm, TermResolver};
use quadstore_compiler::QuerySolution;
use std::io::Write;

pub fn write_xml(out: &mut impl Write, vars: &[String], rows: &[QuerySolution], resolver: &TermResolver<'_>) -> ResultsResult<()> {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
    writeln!(out, "<sparql xmlns=\"http://www.w3.org/2005/sparql-results#\">")?;
    writeln!(out, "  <head>")?;
    for v in vars {
        writeln!(out, "    <variable name=\"{}\"/>", escape_attr(v))?;
    }
    writeln!(out, "  </head>")?;
    writeln!(out, "  <results>")?;
    for row in rows {
        writeln!(out, "    <result>")?;
        for var in vars {
            if let Some(term) = row.get(var) {
                write!(out, "      <binding name=\"{}\">", escape_attr(var))?;
                write_binding_value(out, resolver.resolve(term)?)?;
                writeln!(out, "</binding>")?;
            }
        }
        writeln!(out, "    </result>")?;
    }
    writeln!(out, "  </results>")?;
    writeln!(out, "</sparql>")?;
    Ok(())
}

fn write_binding_value(out: &mut impl Write, term: ResolvedTerm) -> ResultsResult<()> {
    match term {
        ResolvedTerm::Iri(iri) => write!(out, "<uri>{}</uri>", escape_text(&iri))?,
        ResolvedTerm::BlankNode(label) => write!(out, "<bnode>{}</bnode>", escape_text(&label))?,
        ResolvedTerm::Literal { lexical, datatype_iri, lang } => {
            write!(out, "<literal")?;
            if let Some(lang) = &lang {
                write!(out, " xml:lang=\"{}\"", escape_attr(lang))?;
            } else if let Some(dt) = &datatype_iri {
                write!(out, " datatype=\"{}\"", escape_attr(dt))?;
            }
            write!(out, ">{}</literal>", escape_text(&lexical))?;
        }
    }
    Ok(())
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
