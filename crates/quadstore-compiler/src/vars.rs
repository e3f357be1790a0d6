//! Column-naming convention shared by every pattern compiler: each SPARQL variable occupies
//! three SQL columns so object- and data-valued bindings compose uniformly under `UNION`/`JOIN`
//! without the caller needing to know which table produced the row (spec.md §4.6.1, §4.6.8).
//!
//! - `v_{name}`       — INTEGER storid, NULL when this row binds the variable to a literal.
//! - `v_{name}__val`  — the literal's dynamically-typed value, NULL when bound to a storid.
//! - `v_{name}__dt`   — the literal's [`quadstore_model::DatatypeId`], NULL when bound to a storid.

pub fn col_storid(var: &str) -> String {
    format!("\"v_{var}\"")
}

pub fn col_val(var: &str) -> String {
    format!("\"v_{var}__val\"")
}

pub fn col_dt(var: &str) -> String {
    format!("\"v_{var}__dt\"")
}

/// `a.v_x IS b.v_x AND a.v_x__val IS b.v_x__val AND a.v_x__dt IS b.v_x__dt` — a NULL-safe match
/// across a variable's three columns, used both to join on shared variables and to filter a
/// `VALUES`/`BIND` binding against an already-projected column.
pub fn eq_cols(left_alias: &str, right_alias: &str, var: &str) -> String {
    format!(
        "{left_alias}.{s} IS {right_alias}.{s} AND {left_alias}.{v} IS {right_alias}.{v} AND {left_alias}.{d} IS {right_alias}.{d}",
        s = col_storid(var),
        v = col_val(var),
        d = col_dt(var),
    )
}

/// Selects all three columns of `var` from `alias`, aliased back to their bare column names (used
/// when projecting a source table's columns up into a composing SELECT list).
pub fn select_cols(alias: &str, var: &str) -> String {
    format!(
        "{alias}.{s} AS {s}, {alias}.{v} AS {v}, {alias}.{d} AS {d}",
        s = col_storid(var),
        v = col_val(var),
        d = col_dt(var),
    )
}

/// `NULL AS v_x, NULL AS v_x__val, NULL AS v_x__dt` — padding used when one arm of a `UNION`
/// doesn't bind `var` at all.
pub fn null_cols(var: &str) -> String {
    format!(
        "NULL AS {s}, NULL AS {v}, NULL AS {d}",
        s = col_storid(var),
        v = col_val(var),
        d = col_dt(var),
    )
}

/// Unquoted forms of [`col_storid`]/[`col_val`]/[`col_dt`], for looking a result column up by
/// name through `rusqlite::Row::get` rather than splicing it into SQL text.
pub fn raw_storid(var: &str) -> String {
    format!("v_{var}")
}
pub fn raw_val(var: &str) -> String {
    format!("v_{var}__val")
}
pub fn raw_dt(var: &str) -> String {
    format!("v_{var}__dt")
}
