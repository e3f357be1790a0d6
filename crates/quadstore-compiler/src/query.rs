//! Assembles a normalized [`SelectQuery`] into a single executable SQL statement: projection
//! (plain vars, aliased expressions, and aggregates), `GROUP BY`/`HAVING`/`ORDER BY`/`LIMIT`
//! (spec.md §4.6.4, §4.6.8).

use crate::error::{CompileError, CompileResult};
use crate::expr::{compile_bool_expr, compile_value_expr};
use crate::translate::{compile_pattern, Compiled, TranslateCtx};
use crate::vars::{col_dt, col_storid, col_val};
use quadstore_sparql::algebra::{Expression, PatternTerm, Projection, SelectQuery};
use rusqlite::types::Value;
use std::collections::BTreeSet;

/// A fully compiled `SELECT` query, ready to bind `params` and run against a [`rusqlite::Connection`].
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Output variable names in projection order; each names a `v_*`/`v_*__val`/`v_*__dt` column
    /// triple in the result set (spec.md §4.6.8).
    pub output_vars: Vec<String>,
}

pub fn compile_select(ctx: &TranslateCtx<'_>, select: &SelectQuery) -> CompileResult<PreparedQuery> {
    let (sql, params, output_vars) = build_select_sql(ctx, select)?;
    Ok(PreparedQuery { sql, params, output_vars })
}

/// Compiles a sub-`SELECT` for use as an embedded [`quadstore_sparql::algebra::GraphPattern::SubSelect`].
pub fn compile_select_as_pattern(ctx: &TranslateCtx<'_>, select: &SelectQuery) -> CompileResult<Compiled> {
    let (sql, params, output_vars) = build_select_sql(ctx, select)?;
    Ok(Compiled {
        sql,
        vars: output_vars.into_iter().collect(),
        params,
    })
}

fn build_select_sql(ctx: &TranslateCtx<'_>, select: &SelectQuery) -> CompileResult<(String, Vec<Value>, Vec<String>)> {
    let inner = compile_pattern(ctx, &select.pattern)?;
    let alias = "q";
    let mut params = inner.params.clone();

    let (select_list, output_vars) = build_projection(ctx, select, &inner.vars, alias, &mut params)?;

    let mut sql = format!(
        "SELECT {}{select_list} FROM ({}) AS {alias}",
        if select.distinct { "DISTINCT " } else { "" },
        inner.sql
    );

    if !select.group_by.keys.is_empty() {
        let mut keys = Vec::new();
        for key in &select.group_by.keys {
            keys.push(compile_value_expr(ctx, key, alias, &inner.vars, &mut params)?);
        }
        sql.push_str(&format!(" GROUP BY {}", keys.join(", ")));
    } else if has_aggregate(select) {
        // An aggregate projection with no explicit GROUP BY collapses to a single implicit group,
        // which is exactly what omitting GROUP BY already does in SQL.
    }

    if !select.having.is_empty() {
        let mut conds = Vec::new();
        for h in &select.having {
            conds.push(compile_bool_expr(ctx, h, alias, &inner.vars, &mut params)?);
        }
        sql.push_str(&format!(" HAVING {}", conds.join(" AND ")));
    }

    if !select.order_by.is_empty() {
        let mut keys = Vec::new();
        for key in &select.order_by {
            let v = compile_value_expr(ctx, &key.expr, alias, &inner.vars, &mut params)?;
            keys.push(format!("{v} {}", if key.descending { "DESC" } else { "ASC" }));
        }
        sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
    }

    if let Some(limit) = select.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = select.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    } else if let Some(offset) = select.offset {
        sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"));
    }

    Ok((sql, params, output_vars))
}

fn has_aggregate(select: &SelectQuery) -> bool {
    match &select.projection {
        Projection::Star => false,
        Projection::Vars(items) => items.iter().any(|(e, _)| aggregate_of(e).is_some()),
    }
}

fn aggregate_of(expr: &Expression) -> Option<quadstore_sparql::algebra::Aggregate> {
    match expr {
        Expression::FunctionCall(name, args) => quadstore_sparql::parser::as_aggregate(name, args),
        _ => None,
    }
}

fn build_projection(
    ctx: &TranslateCtx<'_>,
    select: &SelectQuery,
    vars: &BTreeSet<String>,
    alias: &str,
    params: &mut Vec<Value>,
) -> CompileResult<(String, Vec<String>)> {
    match &select.projection {
        Projection::Star => {
            let mut cols = Vec::new();
            let mut names = Vec::new();
            for v in vars {
                cols.push(format!(
                    "{alias}.{s} AS {s}, {alias}.{val} AS {val}, {alias}.{dt} AS {dt}",
                    s = col_storid(v),
                    val = col_val(v),
                    dt = col_dt(v),
                ));
                names.push(v.clone());
            }
            Ok((cols.join(", "), names))
        }
        Projection::Vars(items) => {
            let mut cols = Vec::new();
            let mut names = Vec::new();
            for (expr, explicit_alias) in items {
                let output_name = output_name_of(expr, explicit_alias.as_deref())?;
                if let (Expression::Term(PatternTerm::Var(v)), None) = (expr, explicit_alias) {
                    cols.push(format!(
                        "{alias}.{s} AS {os}, {alias}.{val} AS {oval}, {alias}.{dt} AS {odt}",
                        s = col_storid(v),
                        val = col_val(v),
                        dt = col_dt(v),
                        os = col_storid(&output_name),
                        oval = col_val(&output_name),
                        odt = col_dt(&output_name),
                    ));
                } else if let Some(agg) = aggregate_of(expr) {
                    let agg_sql = compile_aggregate(ctx, &agg, alias, vars, params)?;
                    cols.push(format!(
                        "NULL AS {s}, {agg_sql} AS {val}, NULL AS {dt}",
                        s = col_storid(&output_name),
                        val = col_val(&output_name),
                        dt = col_dt(&output_name),
                    ));
                } else {
                    let value_sql = compile_value_expr(ctx, expr, alias, vars, params)?;
                    cols.push(format!(
                        "NULL AS {s}, {value_sql} AS {val}, NULL AS {dt}",
                        s = col_storid(&output_name),
                        val = col_val(&output_name),
                        dt = col_dt(&output_name),
                    ));
                }
                names.push(output_name);
            }
            Ok((cols.join(", "), names))
        }
    }
}

fn output_name_of(expr: &Expression, explicit_alias: Option<&str>) -> CompileResult<String> {
    if let Some(a) = explicit_alias {
        return Ok(a.to_string());
    }
    if let Expression::Term(PatternTerm::Var(v)) = expr {
        return Ok(v.clone());
    }
    Err(CompileError::Unsupported("a projected expression must be given an AS alias".into()))
}

fn compile_aggregate(
    ctx: &TranslateCtx<'_>,
    agg: &quadstore_sparql::algebra::Aggregate,
    alias: &str,
    vars: &BTreeSet<String>,
    params: &mut Vec<Value>,
) -> CompileResult<String> {
    use quadstore_sparql::algebra::AggregateKind;

    if agg.kind == AggregateKind::Count && agg.arg.is_none() {
        return Ok("COUNT(*)".to_string());
    }
    let Some(arg_expr) = &agg.arg else {
        return Err(CompileError::Unsupported(format!("{:?} requires an argument", agg.kind)));
    };
    let value = compile_value_expr(ctx, arg_expr, alias, vars, params)?;
    Ok(match agg.kind {
        AggregateKind::Count => format!("COUNT({value})"),
        AggregateKind::CountDistinct => format!("COUNT(DISTINCT {value})"),
        AggregateKind::Sum => format!("SUM({value})"),
        AggregateKind::Avg => format!("AVG({value})"),
        AggregateKind::Min => format!("MIN({value})"),
        AggregateKind::Max => format!("MAX({value})"),
        AggregateKind::GroupConcat => format!("GROUP_CONCAT({value}, ' ')"),
        AggregateKind::Sample => format!("MIN({value})"),
    })
}
