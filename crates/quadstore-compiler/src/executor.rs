//! Runs a [`crate::query::PreparedQuery`] against a connection and decodes rows back into
//! [`quadstore_model::Term`] bindings (spec.md §4.6.8).

use crate::error::CompileResult;
use crate::query::PreparedQuery;
use crate::vars::{raw_dt, raw_storid, raw_val};
use quadstore_model::{DatatypeId, Literal, LiteralValue, Storid, Term};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};
use std::collections::BTreeMap;

/// One solution row: a binding for each of [`PreparedQuery::output_vars`] (absent if that
/// variable was unbound in this row, e.g. through an `OPTIONAL`).
pub type QuerySolution = BTreeMap<String, Term>;

pub fn execute_select(conn: &Connection, query: &PreparedQuery) -> CompileResult<Vec<QuerySolution>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(query.params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(decode_row(row, &query.output_vars)?);
    }
    Ok(out)
}

pub fn decode_row(row: &Row<'_>, vars: &[String]) -> rusqlite::Result<QuerySolution> {
    let mut solution = QuerySolution::new();
    for var in vars {
        if let Some(term) = decode_binding(row, var)? {
            solution.insert(var.clone(), term);
        }
    }
    Ok(solution)
}

/// Decodes one variable's three-column binding, or `None` if every column is NULL (unbound).
pub fn decode_binding(row: &Row<'_>, var: &str) -> rusqlite::Result<Option<Term>> {
    let storid_col = raw_storid(var);
    let val_col = raw_val(var);
    let dt_col = raw_dt(var);

    let storid_idx = row.as_ref().column_index(&storid_col).ok();
    let val_idx = row.as_ref().column_index(&val_col).ok();
    let dt_idx = row.as_ref().column_index(&dt_col).ok();

    let storid: Option<i64> = match storid_idx {
        Some(i) => row.get(i)?,
        None => None,
    };
    if let Some(s) = storid {
        let id = Storid(s);
        return Ok(Some(if id.is_blank_node() { Term::BlankNode(id) } else { Term::Resource(id) }));
    }

    let dt: Option<i64> = match dt_idx {
        Some(i) => row.get(i)?,
        None => None,
    };
    let Some(dt) = dt else {
        return Ok(None);
    };
    let value = match val_idx {
        Some(i) => match row.get_ref(i)? {
            ValueRef::Integer(n) => LiteralValue::Int(n),
            ValueRef::Real(f) => LiteralValue::Float(f),
            ValueRef::Text(t) => LiteralValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(_) | ValueRef::Null => return Ok(None),
        },
        None => return Ok(None),
    };
    Ok(Some(Term::Literal(Literal::new(value, DatatypeId(dt)))))
}
