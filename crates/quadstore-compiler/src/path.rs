//! Property-path compilation (spec.md §4.5-§4.6.3): every combinator except `*STATIC` compiles to
//! a composable `(__from, __to)` relation over storids; `pred*STATIC` instead eagerly materializes
//! its closure at translate time and inlines it as a constant `IN (...)` list.

use crate::error::{CompileError, CompileResult};
use crate::translate::{Compiled, TranslateCtx};
use crate::vars::{col_dt, col_storid, col_val};
use dashmap::DashMap;
use quadstore_sparql::algebra::{GroundTerm, PatternTerm, PropertyPath};
use rusqlite::types::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// A bare binary relation over storids produced by a path combinator, before it's been
/// projected against the enclosing triple pattern's subject/object terms.
struct StepRelation {
    sql: String,
    params: Vec<Value>,
}

pub fn compile_path(ctx: &TranslateCtx<'_>, subject: &PatternTerm, path: &PropertyPath, object: &PatternTerm) -> CompileResult<Compiled> {
    if let PropertyPath::StaticClosure(inner) = path {
        if let PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(iri))) = inner.as_ref() {
            return compile_static_closure(ctx, subject, iri, object);
        }
    }
    compile_generic(ctx, subject, path, object)
}

fn compile_generic(ctx: &TranslateCtx<'_>, subject: &PatternTerm, path: &PropertyPath, object: &PatternTerm) -> CompileResult<Compiled> {
    let step = compile_step_relation(ctx, path)?;
    let mut params = step.params;
    let mut conds = Vec::new();
    let mut selects = Vec::new();
    let mut vars = BTreeSet::new();

    match subject {
        PatternTerm::Var(v) => {
            selects.push(format!("__from AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)));
            vars.insert(v.clone());
        }
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let storid = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            conds.push("__from = ?".to_string());
            params.push(Value::Integer(storid.get()));
        }
        PatternTerm::Term(_) => return Err(CompileError::Unsupported("a property path's subject must be an IRI or variable".into())),
    }
    match object {
        PatternTerm::Var(v) => {
            selects.push(format!("__to AS {}, NULL AS {}, NULL AS {}", col_storid(v), col_val(v), col_dt(v)));
            vars.insert(v.clone());
        }
        PatternTerm::Term(GroundTerm::Iri(iri)) => {
            let storid = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            conds.push("__to = ?".to_string());
            params.push(Value::Integer(storid.get()));
        }
        PatternTerm::Term(_) => return Err(CompileError::Unsupported("a property path's object must be an IRI or variable".into())),
    }

    let select_list = if selects.is_empty() { "1".to_string() } else { selects.join(", ") };
    let where_clause = if conds.is_empty() { String::new() } else { format!(" WHERE {}", conds.join(" AND ")) };
    Ok(Compiled {
        sql: format!("SELECT {select_list} FROM ({}) AS path{where_clause}", step.sql),
        vars,
        params,
    })
}

fn compile_step_relation(ctx: &TranslateCtx<'_>, path: &PropertyPath) -> CompileResult<StepRelation> {
    match path {
        PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(iri))) => {
            let p = ctx.abbrev.abbreviate(ctx.conn, iri)?;
            let graph = ctx.graph_clause("graph");
            Ok(StepRelation {
                sql: format!("SELECT s AS __from, o AS __to FROM objs WHERE p = ?{graph}"),
                params: vec![Value::Integer(p.get())],
            })
        }
        PropertyPath::Predicate(PatternTerm::Var(_)) => Err(CompileError::VariablePredicatePath),
        PropertyPath::Predicate(PatternTerm::Term(_)) => {
            Err(CompileError::Unsupported("a property path step's predicate must be an IRI".into()))
        }
        PropertyPath::Inverse(inner) => {
            let step = compile_step_relation(ctx, inner)?;
            Ok(StepRelation {
                sql: format!("SELECT __to AS __from, __from AS __to FROM ({}) AS inv", step.sql),
                params: step.params,
            })
        }
        PropertyPath::Sequence(a, b) => {
            let sa = compile_step_relation(ctx, a)?;
            let sb = compile_step_relation(ctx, b)?;
            let mut params = sa.params;
            params.extend(sb.params);
            Ok(StepRelation {
                sql: format!(
                    "SELECT a.__from AS __from, b.__to AS __to FROM ({}) AS a JOIN ({}) AS b ON a.__to = b.__from",
                    sa.sql, sb.sql
                ),
                params,
            })
        }
        PropertyPath::Alternative(a, b) => {
            let sa = compile_step_relation(ctx, a)?;
            let sb = compile_step_relation(ctx, b)?;
            let mut params = sa.params;
            params.extend(sb.params);
            Ok(StepRelation {
                sql: format!("SELECT __from, __to FROM ({}) UNION SELECT __from, __to FROM ({})", sa.sql, sb.sql),
                params,
            })
        }
        PropertyPath::ZeroOrOne(inner) => {
            let step = compile_step_relation(ctx, inner)?;
            Ok(StepRelation {
                sql: format!(
                    "SELECT __from, __to FROM ({0}) \
                     UNION SELECT __from, __from AS __to FROM ({0}) \
                     UNION SELECT __to AS __from, __to FROM ({0})",
                    step.sql
                ),
                params: repeat_params(&step.params, 3),
            })
        }
        PropertyPath::OneOrMore(inner) => {
            let step = compile_step_relation(ctx, inner)?;
            Ok(StepRelation {
                sql: format!(
                    "WITH RECURSIVE closure(__from, __to) AS (\
                       SELECT __from, __to FROM ({0}) \
                       UNION \
                       SELECT c.__from, s.__to FROM closure c JOIN ({0}) AS s ON c.__to = s.__from\
                     ) SELECT DISTINCT __from, __to FROM closure",
                    step.sql
                ),
                params: repeat_params(&step.params, 2),
            })
        }
        PropertyPath::ZeroOrMore(inner) => {
            let step = compile_step_relation(ctx, inner)?;
            Ok(StepRelation {
                sql: format!(
                    "WITH RECURSIVE closure(__from, __to) AS (\
                       SELECT __from, __from AS __to FROM ({0}) \
                       UNION \
                       SELECT __to AS __from, __to AS __to FROM ({0}) \
                       UNION \
                       SELECT c.__from, s.__to FROM closure c JOIN ({0}) AS s ON c.__to = s.__from\
                     ) SELECT DISTINCT __from, __to FROM closure",
                    step.sql
                ),
                params: repeat_params(&step.params, 3),
            })
        }
        // A nested `*STATIC` (not directly the path of a triple pattern) can't use the
        // ground-endpoint inlining trick, since there is no single enclosing triple to inline
        // into; fall back to the same recursive-closure treatment as plain `*`.
        PropertyPath::StaticClosure(inner) => compile_step_relation(ctx, &PropertyPath::ZeroOrMore(inner.clone())),
    }
}

fn repeat_params(params: &[Value], n: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(params.len() * n);
    for _ in 0..n {
        out.extend(params.iter().cloned());
    }
    out
}

type ClosureCache = DashMap<(i64, i64), Arc<Vec<(i64, i64)>>>;

fn static_closure_cache() -> &'static ClosureCache {
    static CACHE: OnceLock<ClosureCache> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

fn materialize_closure(ctx: &TranslateCtx<'_>, predicate_storid: i64) -> CompileResult<Arc<Vec<(i64, i64)>>> {
    let fingerprint = quadstore_store::journal::get_world_fingerprint(ctx.conn)?;
    let key = (predicate_storid, fingerprint);
    if let Some(hit) = static_closure_cache().get(&key) {
        return Ok(Arc::clone(&hit));
    }
    let graph = ctx.graph_clause("graph");
    let sql = format!(
        "WITH RECURSIVE closure(__from, __to) AS (\
           SELECT s, s FROM objs WHERE p = ?1{graph} \
           UNION \
           SELECT o, o FROM objs WHERE p = ?1{graph} \
           UNION \
           SELECT c.__from, o.o FROM closure c JOIN objs o ON o.s = c.__to AND o.p = ?1{graph}\
         ) SELECT DISTINCT __from, __to FROM closure"
    );
    let mut stmt = ctx.conn.prepare(&sql)?;
    let pairs: Vec<(i64, i64)> = stmt
        .query_map(rusqlite::params![predicate_storid], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;
    let arc = Arc::new(pairs);
    static_closure_cache().insert(key, Arc::clone(&arc));
    Ok(arc)
}

fn compile_static_closure(ctx: &TranslateCtx<'_>, subject: &PatternTerm, predicate_iri: &str, object: &PatternTerm) -> CompileResult<Compiled> {
    let p = ctx.abbrev.abbreviate(ctx.conn, predicate_iri)?;
    let pairs = materialize_closure(ctx, p.get())?;

    match (subject, object) {
        (PatternTerm::Term(GroundTerm::Iri(s_iri)), PatternTerm::Var(ov)) => {
            let s = ctx.abbrev.abbreviate(ctx.conn, s_iri)?.get();
            let tos: Vec<i64> = pairs.iter().filter(|(f, _)| *f == s).map(|(_, t)| *t).collect();
            Ok(inline_var_list(ov, &tos))
        }
        (PatternTerm::Var(sv), PatternTerm::Term(GroundTerm::Iri(o_iri))) => {
            let o = ctx.abbrev.abbreviate(ctx.conn, o_iri)?.get();
            let froms: Vec<i64> = pairs.iter().filter(|(_, t)| *t == o).map(|(f, _)| *f).collect();
            Ok(inline_var_list(sv, &froms))
        }
        (PatternTerm::Term(GroundTerm::Iri(s_iri)), PatternTerm::Term(GroundTerm::Iri(o_iri))) => {
            let s = ctx.abbrev.abbreviate(ctx.conn, s_iri)?.get();
            let o = ctx.abbrev.abbreviate(ctx.conn, o_iri)?.get();
            let matches = pairs.iter().any(|(f, t)| *f == s && *t == o);
            Ok(Compiled {
                sql: format!("SELECT 1 WHERE {}", if matches { "1=1" } else { "1=0" }),
                vars: BTreeSet::new(),
                params: Vec::new(),
            })
        }
        (PatternTerm::Var(_), PatternTerm::Var(_)) => Err(CompileError::Unsupported(
            "pred*STATIC requires at least one of the triple pattern's endpoints to be ground".into(),
        )),
        _ => Err(CompileError::Unsupported("pred*STATIC endpoints must be an IRI or a variable".into())),
    }
}

fn inline_var_list(var: &str, values: &[i64]) -> Compiled {
    let mut vars = BTreeSet::new();
    vars.insert(var.to_string());
    if values.is_empty() {
        return Compiled {
            sql: format!("SELECT {}, {}, {} WHERE 0", col_storid(var), col_val(var), col_dt(var)),
            vars,
            params: Vec::new(),
        };
    }
    let rows = values.iter().map(|_| "(?)").collect::<Vec<_>>().join(", ");
    Compiled {
        sql: format!(
            "SELECT x AS {}, NULL AS {}, NULL AS {} FROM (VALUES {rows}) AS closure(x)",
            col_storid(var),
            col_val(var),
            col_dt(var)
        ),
        vars,
        params: values.iter().map(|v| Value::Integer(*v)).collect(),
    }
}
