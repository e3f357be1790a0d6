//! Translates a normalized [`quadstore_sparql::algebra::GraphPattern`] into a single SQL `SELECT`
//! whose result columns follow the [`crate::vars`] convention (spec.md §4.6.1-§4.6.4).

use crate::error::{CompileError, CompileResult};
use crate::literal::{resolve_bare_literal, resolve_literal};
use crate::path::compile_path;
use crate::vars::{col_dt, col_storid, col_val, eq_cols, null_cols, select_cols};
use quadstore_sparql::algebra::{GraphPattern, GroundTerm, PatternTerm, PropertyPath, TriplePattern};
use quadstore_store::{predicate, Abbreviator};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// A compiled fragment: a bare `SELECT ...` (no trailing semicolon, safe to parenthesize and
/// alias), the SPARQL variables it binds, and the positional parameters its `?` placeholders
/// consume in order.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub sql: String,
    pub vars: BTreeSet<String>,
    pub params: Vec<Value>,
}

pub struct TranslateCtx<'a> {
    pub conn: &'a Connection,
    pub abbrev: &'a Abbreviator,
    /// Resolved graph storids this query is scoped to; baked into generated SQL as literal
    /// constants because the prepared-query cache key already includes the graph stack
    /// fingerprint (spec.md §4.7).
    pub graph_scope: Vec<i64>,
    next_alias: std::cell::Cell<u32>,
}

impl<'a> TranslateCtx<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection, abbrev: &'a Abbreviator, graph_scope: Vec<i64>) -> Self {
        Self {
            conn,
            abbrev,
            graph_scope,
            next_alias: std::cell::Cell::new(0),
        }
    }

    fn fresh_alias(&self) -> String {
        let n = self.next_alias.get();
        self.next_alias.set(n + 1);
        format!("t{n}")
    }

    pub(crate) fn graph_clause(&self, column: &str) -> String {
        if self.graph_scope.is_empty() {
            String::new()
        } else {
            let list = self.graph_scope.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
            format!(" AND {column} IN ({list})")
        }
    }
}

pub fn compile_pattern(ctx: &TranslateCtx<'_>, pattern: &GraphPattern) -> CompileResult<Compiled> {
    match pattern {
        GraphPattern::Bgp(triples) => compile_bgp(ctx, triples),
        GraphPattern::Join(l, r) => {
            let a = compile_pattern(ctx, l)?;
            let b = compile_pattern(ctx, r)?;
            Ok(join(ctx, a, b, JoinKind::Inner))
        }
        GraphPattern::Optional(l, r) => {
            let a = compile_pattern(ctx, l)?;
            let b = compile_pattern(ctx, r)?;
            Ok(join(ctx, a, b, JoinKind::Left))
        }
        GraphPattern::Union(l, r) => {
            let a = compile_pattern(ctx, l)?;
            let b = compile_pattern(ctx, r)?;
            Ok(union(a, b))
        }
        GraphPattern::Filter(expr, inner) => {
            let inner = compile_pattern(ctx, inner)?;
            let alias = ctx.fresh_alias();
            let mut params = inner.params.clone();
            let cond = crate::expr::compile_bool_expr(ctx, expr, &alias, &inner.vars, &mut params)?;
            let cols = select_list(&alias, &inner.vars);
            Ok(Compiled {
                sql: format!("SELECT {cols} FROM ({}) AS {alias} WHERE {cond}", inner.sql),
                vars: inner.vars,
                params,
            })
        }
        GraphPattern::Extend(inner, var, expr) => {
            let inner = compile_pattern(ctx, inner)?;
            let alias = ctx.fresh_alias();
            let mut params = inner.params.clone();
            let value_sql = crate::expr::compile_value_expr(ctx, expr, &alias, &inner.vars, &mut params)?;
            let mut cols = select_list(&alias, &inner.vars);
            cols.push_str(&format!(", {value_sql} AS {}, NULL AS {}, NULL AS {}", col_storid(var), col_val(var), col_dt(var)));
            let mut vars = inner.vars.clone();
            vars.insert(var.clone());
            Ok(Compiled {
                sql: format!("SELECT {cols} FROM ({}) AS {alias}", inner.sql),
                vars,
                params,
            })
        }
        GraphPattern::Graph(term, inner) => compile_graph(ctx, term, inner),
        GraphPattern::Values { vars, rows } => compile_values(ctx, vars, rows),
        GraphPattern::SubSelect(sel) => crate::query::compile_select_as_pattern(ctx, sel),
    }
}

fn compile_graph(ctx: &TranslateCtx<'_>, term: &PatternTerm, inner: &GraphPattern) -> CompileResult<Compiled> {
    match term {
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let storid = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            let scoped = TranslateCtx {
                conn: ctx.conn,
                abbrev: ctx.abbrev,
                graph_scope: vec![storid.get()],
                next_alias: std::cell::Cell::new(ctx.next_alias.get()),
            };
            let compiled = compile_pattern(&scoped, inner)?;
            ctx.next_alias.set(scoped.next_alias.get());
            Ok(compiled)
        }
        PatternTerm::Var(var) => match inner {
            // Each triple in the BGP independently projects its row's `graph` column as `?g`;
            // the ordinary shared-variable join in compile_bgp then forces every triple to agree
            // on the same graph, which is exactly GRAPH ?g's binding semantics.
            GraphPattern::Bgp(triples) => compile_bgp_scoped(ctx, triples, Some(var)),
            _ => Err(CompileError::Unsupported(
                "GRAPH ?var is only supported directly wrapping a basic graph pattern".into(),
            )),
        },
        _ => Err(CompileError::Unsupported("GRAPH term must be an IRI or a variable".into())),
    }
}

fn compile_values(ctx: &TranslateCtx<'_>, vars: &[String], rows: &[Vec<Option<GroundTerm>>]) -> CompileResult<Compiled> {
    let mut params = Vec::new();
    let mut selects = Vec::new();
    for row in rows {
        let mut cols = Vec::new();
        for (var, cell) in vars.iter().zip(row.iter()) {
            match cell {
                None => cols.push(format!(
                    "NULL AS {}, NULL AS {}, NULL AS {}",
                    col_storid(var),
                    col_val(var),
                    col_dt(var)
                )),
                Some(term) => {
                    let (storid_sql, val_sql, dt_sql) = ground_term_cols(ctx, term, &mut params)?;
                    cols.push(format!(
                        "{storid_sql} AS {}, {val_sql} AS {}, {dt_sql} AS {}",
                        col_storid(var),
                        col_val(var),
                        col_dt(var)
                    ));
                }
            }
        }
        selects.push(format!("SELECT {}", cols.join(", ")));
    }
    let sql = if selects.is_empty() {
        // An empty VALUES clause binds zero rows but must still type-check as a pattern.
        let cols = vars
            .iter()
            .map(|v| format!("{}, {}, {}", null_cols(v), "", ""))
            .collect::<Vec<_>>()
            .join(", ")
            .replace(", , ", ", ");
        format!("SELECT {cols} WHERE 0")
    } else {
        selects.join(" UNION ALL ")
    };
    Ok(Compiled {
        sql,
        vars: vars.iter().cloned().collect(),
        params,
    })
}

fn ground_term_cols(ctx: &TranslateCtx<'_>, term: &GroundTerm, params: &mut Vec<Value>) -> CompileResult<(String, String, String)> {
    match term {
        GroundTerm::Iri(iri) => {
            let storid = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            params.push(Value::Integer(storid.get()));
            Ok(("?".to_string(), "NULL".to_string(), "NULL".to_string()))
        }
        GroundTerm::BlankNode(_) => Err(CompileError::Unsupported(
            "blank-node literals may not appear as a VALUES cell (use a variable)".into(),
        )),
        GroundTerm::Literal { .. } => {
            let (lv, dt) = resolve_bare_literal(term)
                .map(Ok)
                .unwrap_or_else(|| match term {
                    GroundTerm::Literal { value, lang, datatype } => {
                        resolve_literal(ctx.conn, ctx.abbrev, value, lang.as_deref(), datatype.as_deref())
                    }
                    _ => unreachable!(),
                })?;
            params.push(crate::expr::literal_value_to_sql(&lv));
            params.push(Value::Integer(dt.0));
            Ok(("NULL".to_string(), "?".to_string(), "?".to_string()))
        }
    }
}

fn select_list(alias: &str, vars: &BTreeSet<String>) -> String {
    vars.iter().map(|v| select_cols(alias, v)).collect::<Vec<_>>().join(", ")
}

enum JoinKind {
    Inner,
    Left,
}

fn join(ctx: &TranslateCtx<'_>, a: Compiled, b: Compiled, kind: JoinKind) -> Compiled {
    let alias_a = ctx.fresh_alias();
    let alias_b = ctx.fresh_alias();
    let shared: Vec<&String> = a.vars.intersection(&b.vars).collect();
    let on = if shared.is_empty() {
        "1 = 1".to_string()
    } else {
        shared.iter().map(|v| eq_cols(&alias_a, &alias_b, v)).collect::<Vec<_>>().join(" AND ")
    };
    let join_kw = match kind {
        JoinKind::Inner => "JOIN",
        JoinKind::Left => "LEFT JOIN",
    };

    let mut vars = a.vars.clone();
    vars.extend(b.vars.iter().cloned());

    let mut cols = Vec::new();
    for v in &vars {
        if a.vars.contains(v) {
            cols.push(select_cols(&alias_a, v));
        } else {
            cols.push(select_cols(&alias_b, v));
        }
    }

    let mut params = a.params;
    params.extend(b.params);

    Compiled {
        sql: format!(
            "SELECT {} FROM ({}) AS {alias_a} {join_kw} ({}) AS {alias_b} ON {on}",
            cols.join(", "),
            a.sql,
            b.sql
        ),
        vars,
        params,
    }
}

fn union(a: Compiled, b: Compiled) -> Compiled {
    let mut vars = a.vars.clone();
    vars.extend(b.vars.iter().cloned());

    let a_cols = vars
        .iter()
        .map(|v| if a.vars.contains(v) { select_cols_bare(v) } else { null_cols(v) })
        .collect::<Vec<_>>()
        .join(", ");
    let b_cols = vars
        .iter()
        .map(|v| if b.vars.contains(v) { select_cols_bare(v) } else { null_cols(v) })
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = a.params;
    params.extend(b.params);

    Compiled {
        sql: format!("SELECT {a_cols} FROM ({}) AS u WHERE 1=1 UNION ALL SELECT {b_cols} FROM ({}) AS u2 WHERE 1=1", a.sql, b.sql),
        vars,
        params,
    }
}

/// Selects a variable's three columns by bare name (no alias prefix) — valid only when the
/// surrounding `FROM (...) AS u` subquery already produced exactly those column names, as is the
/// case for every `Compiled` this module produces.
fn select_cols_bare(var: &str) -> String {
    format!("{s}, {v}, {d}", s = col_storid(var), v = col_val(var), d = col_dt(var))
}

fn compile_bgp(ctx: &TranslateCtx<'_>, triples: &[TriplePattern]) -> CompileResult<Compiled> {
    compile_bgp_scoped(ctx, triples, None)
}

/// Compiles a BGP, optionally binding every triple's matched graph into `graph_var` (used for
/// `GRAPH ?g { ... }`). Every triple projects the same variable name, so the ordinary
/// shared-variable join already performed between triples enforces that they all matched the
/// same graph.
fn compile_bgp_scoped(ctx: &TranslateCtx<'_>, triples: &[TriplePattern], graph_var: Option<&str>) -> CompileResult<Compiled> {
    if triples.is_empty() {
        return if graph_var.is_some() {
            Err(CompileError::Unsupported("GRAPH ?var {} requires at least one triple pattern".into()))
        } else {
            Ok(Compiled {
                sql: "SELECT 1 WHERE 1=1".to_string(),
                vars: BTreeSet::new(),
                params: Vec::new(),
            })
        };
    }
    let mut acc: Option<Compiled> = None;
    for t in triples {
        let next = compile_triple(ctx, t, graph_var)?;
        acc = Some(match acc {
            Some(a) => join(ctx, a, next, JoinKind::Inner),
            None => next,
        });
    }
    Ok(acc.expect("non-empty triples checked above"))
}

fn compile_triple(ctx: &TranslateCtx<'_>, t: &TriplePattern, graph_var: Option<&str>) -> CompileResult<Compiled> {
    match &t.path {
        PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(iri))) => {
            compile_ground_predicate(ctx, &t.subject, iri, &t.object, graph_var)
        }
        PropertyPath::Predicate(PatternTerm::Var(pvar)) => compile_var_predicate(ctx, &t.subject, pvar, &t.object, graph_var),
        PropertyPath::Predicate(_) => Err(CompileError::Unsupported("predicate position must be an IRI or variable".into())),
        path => {
            if graph_var.is_some() {
                return Err(CompileError::Unsupported("GRAPH ?var does not support property paths".into()));
            }
            compile_path(ctx, &t.subject, path, &t.object)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TableMode {
    Object,
    Data,
    Union,
}

fn compile_ground_predicate(
    ctx: &TranslateCtx<'_>,
    subject: &PatternTerm,
    iri: &str,
    object: &PatternTerm,
    graph_var: Option<&str>,
) -> CompileResult<Compiled> {
    let p = ctx.abbrev.abbreviate(ctx.conn, iri)?;
    let kind = predicate::get_kind(ctx.conn, p)?;

    let table_mode = match object {
        PatternTerm::Term(GroundTerm::Literal { .. }) => TableMode::Data,
        PatternTerm::Term(GroundTerm::Iri(_) | GroundTerm::BlankNode(_)) => TableMode::Object,
        PatternTerm::Var(_) if kind.is_object && !kind.is_data => TableMode::Object,
        PatternTerm::Var(_) if kind.is_data && !kind.is_object => TableMode::Data,
        PatternTerm::Var(_) => TableMode::Union,
    };

    match table_mode {
        TableMode::Object => compile_object_pattern(ctx, subject, p.get(), object, graph_var),
        TableMode::Data => compile_data_pattern(ctx, subject, p.get(), object, graph_var),
        TableMode::Union => {
            let obj = compile_object_pattern(ctx, subject, p.get(), object, graph_var)?;
            let data = compile_data_pattern(ctx, subject, p.get(), object, graph_var)?;
            Ok(union(obj, data))
        }
    }
}

fn graph_var_select(graph_var: Option<&str>) -> Option<String> {
    graph_var.map(|v| format!("graph AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)))
}

fn compile_object_pattern(
    ctx: &TranslateCtx<'_>,
    subject: &PatternTerm,
    p: i64,
    object: &PatternTerm,
    graph_var: Option<&str>,
) -> CompileResult<Compiled> {
    let mut params = Vec::new();
    let mut conds = vec!["p = ?".to_string()];
    params.push(Value::Integer(p));
    conds.push(format!("1=1{}", ctx.graph_clause("graph")));

    let mut selects = Vec::new();
    let mut vars = BTreeSet::new();
    bind_object_side(&mut selects, &mut vars, &mut conds, &mut params, subject, "s", ctx)?;
    bind_object_side(&mut selects, &mut vars, &mut conds, &mut params, object, "o", ctx)?;
    if let Some(gsel) = graph_var_select(graph_var) {
        selects.push(gsel);
        vars.insert(graph_var.expect("graph_var_select returned Some").to_string());
    }

    let select_list = if selects.is_empty() { "1".to_string() } else { selects.join(", ") };
    Ok(Compiled {
        sql: format!("SELECT {select_list} FROM objs WHERE {}", conds.join(" AND ")),
        vars,
        params,
    })
}

fn compile_data_pattern(
    ctx: &TranslateCtx<'_>,
    subject: &PatternTerm,
    p: i64,
    object: &PatternTerm,
    graph_var: Option<&str>,
) -> CompileResult<Compiled> {
    let mut params = Vec::new();
    let mut conds = vec!["p = ?".to_string()];
    params.push(Value::Integer(p));
    conds.push(format!("1=1{}", ctx.graph_clause("graph")));

    let mut selects = Vec::new();
    let mut vars = BTreeSet::new();

    match subject {
        PatternTerm::Var(v) => {
            selects.push(format!("s AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)));
            vars.insert(v.clone());
        }
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let s = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            conds.push("s = ?".to_string());
            params.push(Value::Integer(s.get()));
        }
        PatternTerm::Term(GroundTerm::BlankNode(_)) => {
            return Err(CompileError::Unsupported("blank-node subjects must be normalized to variables".into()))
        }
        PatternTerm::Term(GroundTerm::Literal { .. }) => {
            return Err(CompileError::Unsupported("a literal cannot be a triple's subject".into()))
        }
    }

    match object {
        PatternTerm::Var(v) => {
            selects.push(format!("NULL AS {}, value AS {}, dtype AS {}", col_storid(v), col_val(v), col_dt(v)));
            vars.insert(v.clone());
        }
        PatternTerm::Term(lit @ GroundTerm::Literal { value, lang, datatype }) => {
            let (lv, dt) = resolve_bare_literal(lit)
                .map(Ok)
                .unwrap_or_else(|| resolve_literal(ctx.conn, ctx.abbrev, value, lang.as_deref(), datatype.as_deref()))?;
            conds.push("value = ? AND dtype = ?".to_string());
            params.push(crate::expr::literal_value_to_sql(&lv));
            params.push(Value::Integer(dt.0));
        }
        PatternTerm::Term(_) => return Err(CompileError::Unsupported("a data predicate's object must be a literal".into())),
    }
    if let Some(gsel) = graph_var_select(graph_var) {
        selects.push(gsel);
        vars.insert(graph_var.expect("graph_var_select returned Some").to_string());
    }

    let select_list = if selects.is_empty() { "1".to_string() } else { selects.join(", ") };
    Ok(Compiled {
        sql: format!("SELECT {select_list} FROM datas WHERE {}", conds.join(" AND ")),
        vars,
        params,
    })
}

fn bind_object_side(
    selects: &mut Vec<String>,
    vars: &mut BTreeSet<String>,
    conds: &mut Vec<String>,
    params: &mut Vec<Value>,
    term: &PatternTerm,
    column: &str,
    ctx: &TranslateCtx<'_>,
) -> CompileResult<()> {
    match term {
        PatternTerm::Var(v) => {
            selects.push(format!("{column} AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)));
            vars.insert(v.clone());
        }
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let storid = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            conds.push(format!("{column} = ?"));
            params.push(Value::Integer(storid.get()));
        }
        PatternTerm::Term(GroundTerm::BlankNode(_)) => {
            return Err(CompileError::Unsupported("blank-node terms must be normalized to variables".into()))
        }
        PatternTerm::Term(GroundTerm::Literal { .. }) => {
            return Err(CompileError::Unsupported("an object-valued position cannot hold a literal".into()))
        }
    }
    Ok(())
}

fn compile_var_predicate(
    ctx: &TranslateCtx<'_>,
    subject: &PatternTerm,
    pvar: &str,
    object: &PatternTerm,
    graph_var: Option<&str>,
) -> CompileResult<Compiled> {
    let mut obj_params = Vec::new();
    let mut obj_conds = vec![format!("1=1{}", ctx.graph_clause("graph"))];
    let mut obj_selects = vec![format!("p AS {}, NULL AS {}, NULL AS {}", col_storid(pvar), col_val(pvar), col_dt(pvar))];
    let mut vars = BTreeSet::new();
    vars.insert(pvar.to_string());
    bind_object_side(&mut obj_selects, &mut vars, &mut obj_conds, &mut obj_params, subject, "s", ctx)?;
    bind_object_side(&mut obj_selects, &mut vars, &mut obj_conds, &mut obj_params, object, "o", ctx)?;
    if let Some(gsel) = graph_var_select(graph_var) {
        obj_selects.push(gsel);
        vars.insert(graph_var.expect("graph_var_select returned Some").to_string());
    }
    let obj = Compiled {
        sql: format!("SELECT {} FROM objs WHERE {}", obj_selects.join(", "), obj_conds.join(" AND ")),
        vars: vars.clone(),
        params: obj_params,
    };

    let mut data_params = Vec::new();
    let mut data_conds = vec![format!("1=1{}", ctx.graph_clause("graph"))];
    let mut data_selects = vec![format!("p AS {}, NULL AS {}, NULL AS {}", col_storid(pvar), col_val(pvar), col_dt(pvar))];
    match subject {
        PatternTerm::Var(v) => {
            data_selects.push(format!("s AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)));
        }
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let s = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            data_conds.push("s = ?".to_string());
            data_params.push(Value::Integer(s.get()));
        }
        _ => return Err(CompileError::Unsupported("unsupported subject term in ?p data pattern".into())),
    }
    match object {
        PatternTerm::Var(v) => {
            data_selects.push(format!("NULL AS {}, value AS {}, dtype AS {}", col_storid(v), col_val(v), col_dt(v)));
        }
        PatternTerm::Term(lit @ GroundTerm::Literal { value, lang, datatype }) => {
            let (lv, dt) = resolve_bare_literal(lit)
                .map(Ok)
                .unwrap_or_else(|| resolve_literal(ctx.conn, ctx.abbrev, value, lang.as_deref(), datatype.as_deref()))?;
            data_conds.push("value = ? AND dtype = ?".to_string());
            data_params.push(crate::expr::literal_value_to_sql(&lv));
            data_params.push(Value::Integer(dt.0));
        }
        _ => return Err(CompileError::Unsupported("unsupported object term in ?p data pattern".into())),
    }
    if let Some(gsel) = graph_var_select(graph_var) {
        data_selects.push(gsel);
    }
    let data = Compiled {
        sql: format!("SELECT {} FROM datas WHERE {}", data_selects.join(", "), data_conds.join(" AND ")),
        vars,
        params: data_params,
    };

    Ok(union(obj, data))
}
