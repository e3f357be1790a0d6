//! Resolves a parsed, normalized literal (lexical value + optional lang tag/datatype IRI) to the
//! native `(LiteralValue, DatatypeId)` pair the store indexes on (spec.md §3).

use crate::error::CompileResult;
use quadstore_model::{DatatypeId, LiteralValue};
use quadstore_sparql::algebra::GroundTerm;
use quadstore_store::Abbreviator;
use rusqlite::Connection;

pub fn resolve_literal(
    conn: &Connection,
    abbrev: &Abbreviator,
    value: &str,
    lang: Option<&str>,
    datatype: Option<&str>,
) -> CompileResult<(LiteralValue, DatatypeId)> {
    if let Some(tag) = lang {
        let tag_id = abbrev.intern_lang(conn, tag)?;
        return Ok((LiteralValue::Text(value.to_string()), DatatypeId::lang(tag_id)));
    }
    let Some(dt_iri) = datatype else {
        return Ok((LiteralValue::Text(value.to_string()), DatatypeId::PLAIN));
    };
    let storid = abbrev.abbreviate(conn, dt_iri)?;
    let lv = match dt_iri {
        "http://www.w3.org/2001/XMLSchema#integer"
        | "http://www.w3.org/2001/XMLSchema#int"
        | "http://www.w3.org/2001/XMLSchema#long"
        | "http://www.w3.org/2001/XMLSchema#short" => {
            LiteralValue::Int(value.parse().map_err(|_| invalid_lexical(value, dt_iri))?)
        }
        "http://www.w3.org/2001/XMLSchema#decimal"
        | "http://www.w3.org/2001/XMLSchema#double"
        | "http://www.w3.org/2001/XMLSchema#float" => {
            LiteralValue::Float(value.parse().map_err(|_| invalid_lexical(value, dt_iri))?)
        }
        "http://www.w3.org/2001/XMLSchema#boolean" => {
            LiteralValue::Bool(value.parse().map_err(|_| invalid_lexical(value, dt_iri))?)
        }
        _ => LiteralValue::Text(value.to_string()),
    };
    Ok((lv, DatatypeId::xsd(storid)))
}

/// Resolves an un-annotated numeric/boolean lexical form the parser produced directly from a
/// `Token::Number`/`Token::True`/`Token::False` (no explicit `^^` datatype given in the query).
pub fn resolve_bare_literal(term: &GroundTerm) -> Option<(LiteralValue, DatatypeId)> {
    let GroundTerm::Literal { value, lang: None, datatype: None } = term else {
        return None;
    };
    if value == "true" || value == "false" {
        return Some((LiteralValue::Bool(value == "true"), DatatypeId::xsd(quadstore_model::vocab::XSD_BOOLEAN)));
    }
    if let Ok(i) = value.parse::<i64>() {
        return Some((LiteralValue::Int(i), DatatypeId::xsd(quadstore_model::vocab::XSD_INTEGER)));
    }
    if let Ok(f) = value.parse::<f64>() {
        return Some((LiteralValue::Float(f), DatatypeId::xsd(quadstore_model::vocab::XSD_DOUBLE)));
    }
    None
}

fn invalid_lexical(value: &str, dt_iri: &str) -> quadstore_store::StoreError {
    quadstore_store::StoreError::OntologyParsing(format!("{value:?} is not a valid lexical form for {dt_iri}"))
}
