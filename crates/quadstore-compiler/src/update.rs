//! Compiles and executes a normalized [`UpdateQuery`] (spec.md §4.6.6): ground `INSERT
//! DATA`/`DELETE DATA` blocks are applied directly; `DELETE{..}INSERT{..}[USING][WHERE{..}]` runs
//! the pattern as an ordinary read query and drives each solution row through
//! [`Quadstore::add_obj`]/[`Quadstore::add_data`]/[`Quadstore::del_obj`]/[`Quadstore::del_data`] so
//! predicate-kind recording and journal-touching stay centralized in the store crate.

use crate::error::{CompileError, CompileResult};
use crate::executor::decode_binding;
use crate::literal::{resolve_bare_literal, resolve_literal};
use crate::translate::{compile_pattern, TranslateCtx};
use quadstore_sparql::algebra::{GraphPattern, GroundTerm, PatternTerm, PropertyPath, TriplePattern, UpdateOperation, UpdateQuery};
use quadstore_model::Term;
use quadstore_store::Quadstore;
use rusqlite::{Connection, Row};
use std::collections::HashMap;

/// Triples affected, split by operation kind, across every statement in the update.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateSummary {
    pub inserted: usize,
    pub deleted: usize,
}

pub fn execute_update(
    conn: &Connection,
    store: &Quadstore,
    ctx: &TranslateCtx<'_>,
    default_graph: quadstore_model::Storid,
    update: &UpdateQuery,
) -> CompileResult<UpdateSummary> {
    let mut summary = UpdateSummary::default();
    for op in &update.operations {
        match op {
            UpdateOperation::InsertData(triples) => {
                summary.inserted += apply_ground_triples(conn, store, ctx, default_graph, triples, true)?;
            }
            UpdateOperation::DeleteData(triples) => {
                summary.deleted += apply_ground_triples(conn, store, ctx, default_graph, triples, false)?;
            }
            UpdateOperation::DeleteInsert { delete, insert, using, pattern } => {
                let (d, i) = apply_delete_insert(conn, store, ctx, default_graph, delete, insert, using.as_ref(), pattern.as_ref())?;
                summary.deleted += d;
                summary.inserted += i;
            }
        }
    }
    Ok(summary)
}

fn apply_ground_triples(
    conn: &Connection,
    store: &Quadstore,
    ctx: &TranslateCtx<'_>,
    graph: quadstore_model::Storid,
    triples: &[TriplePattern],
    insert: bool,
) -> CompileResult<usize> {
    let mut count = 0;
    for t in triples {
        let PropertyPath::Predicate(PatternTerm::Term(GroundTerm::Iri(p_iri))) = &t.path else {
            return Err(CompileError::Unsupported("INSERT/DELETE DATA triples must use a ground IRI predicate".into()));
        };
        let p = ctx.abbrev.abbreviate(conn, p_iri)?;
        let s = ground_node_storid(ctx, conn, &t.subject)?;

        let changed = match &t.object {
            PatternTerm::Term(lit @ GroundTerm::Literal { value, lang, datatype }) => {
                let (lv, dt) = resolve_bare_literal(lit)
                    .map(Ok)
                    .unwrap_or_else(|| resolve_literal(conn, ctx.abbrev, value, lang.as_deref(), datatype.as_deref()))?;
                if insert {
                    store.add_data(conn, graph, s, p, &lv, dt)?
                } else {
                    store.del_data_exact(conn, graph, s, p, &lv, dt)?
                }
            }
            _ => {
                let o = ground_node_storid(ctx, conn, &t.object)?;
                if insert {
                    store.add_obj(conn, graph, s, p, o)?
                } else {
                    store.del_obj(conn, Some(graph), Some(s), Some(p), Some(o))? > 0
                }
            }
        };
        if changed {
            count += 1;
        }
    }
    Ok(count)
}

fn ground_node_storid(ctx: &TranslateCtx<'_>, conn: &Connection, term: &PatternTerm) -> CompileResult<quadstore_model::Storid> {
    match term {
        PatternTerm::Term(GroundTerm::Iri(iri)) => Ok(ctx.abbrev.abbreviate(conn, iri)?),
        _ => Err(CompileError::Unsupported("expected a ground IRI node in an INSERT/DELETE DATA block".into())),
    }
}

fn apply_delete_insert(
    conn: &Connection,
    store: &Quadstore,
    ctx: &TranslateCtx<'_>,
    default_graph: quadstore_model::Storid,
    delete: &[TriplePattern],
    insert: &[TriplePattern],
    using: Option<&PatternTerm>,
    pattern: Option<&GraphPattern>,
) -> CompileResult<(usize, usize)> {
    let graph = match using {
        Some(PatternTerm::Term(GroundTerm::Iri(iri))) => ctx.abbrev.abbreviate(conn, iri)?,
        _ => default_graph,
    };

    let rows: Vec<HashMap<String, Term>> = match pattern {
        Some(p) => {
            let compiled = compile_pattern(ctx, p)?;
            let mut stmt = conn.prepare(&compiled.sql)?;
            let var_list: Vec<String> = compiled.vars.iter().cloned().collect();
            let mut query_rows = stmt.query(rusqlite::params_from_iter(compiled.params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = query_rows.next()? {
                out.push(decode_env(row, &var_list)?);
            }
            out
        }
        None => vec![HashMap::new()],
    };

    let mut deleted = 0;
    let mut inserted = 0;
    for row in &rows {
        let mut bnode_cache = HashMap::new();
        for t in delete {
            if let Some((s, p, obj)) = resolve_template_triple(ctx, conn, t, row, &mut bnode_cache)? {
                deleted += apply_resolved(conn, store, graph, s, p, &obj, false)?;
            }
        }
        for t in insert {
            if let Some((s, p, obj)) = resolve_template_triple(ctx, conn, t, row, &mut bnode_cache)? {
                inserted += apply_resolved(conn, store, graph, s, p, &obj, true)?;
            }
        }
    }
    Ok((deleted, inserted))
}

fn decode_env(row: &Row<'_>, vars: &[String]) -> rusqlite::Result<HashMap<String, Term>> {
    let mut env = HashMap::new();
    for v in vars {
        if let Some(term) = decode_binding(row, v)? {
            env.insert(v.clone(), term);
        }
    }
    Ok(env)
}

/// Resolves a template triple's subject/predicate/object against a solution row, returning
/// `None` if any non-blank-node-origin variable is unbound (the triple is then skipped for this
/// row, matching SPARQL Update semantics).
fn resolve_template_triple(
    ctx: &TranslateCtx<'_>,
    conn: &Connection,
    t: &TriplePattern,
    row: &HashMap<String, Term>,
    bnode_cache: &mut HashMap<String, quadstore_model::Storid>,
) -> CompileResult<Option<(quadstore_model::Storid, quadstore_model::Storid, Term)>> {
    let PropertyPath::Predicate(pred_term) = &t.path else {
        return Err(CompileError::Unsupported("update templates may not use property paths".into()));
    };
    let Some(subject) = resolve_template_term(ctx, conn, &t.subject, row, bnode_cache)? else {
        return Ok(None);
    };
    let Some(predicate) = resolve_template_term(ctx, conn, pred_term, row, bnode_cache)? else {
        return Ok(None);
    };
    let Some(object) = resolve_template_term(ctx, conn, &t.object, row, bnode_cache)? else {
        return Ok(None);
    };

    let s = match subject {
        Term::Resource(id) | Term::BlankNode(id) => id,
        Term::Literal(_) => return Err(CompileError::Unsupported("a literal cannot be a triple's subject".into())),
    };
    let p = match predicate {
        Term::Resource(id) => id,
        Term::BlankNode(_) | Term::Literal(_) => return Err(CompileError::Unsupported("a triple's predicate must be an IRI".into())),
    };
    Ok(Some((s, p, object)))
}

fn resolve_template_term(
    ctx: &TranslateCtx<'_>,
    conn: &Connection,
    term: &PatternTerm,
    row: &HashMap<String, Term>,
    bnode_cache: &mut HashMap<String, quadstore_model::Storid>,
) -> CompileResult<Option<Term>> {
    match term {
        PatternTerm::Term(GroundTerm::Iri(iri)) => Ok(Some(Term::Resource(ctx.abbrev.abbreviate(conn, iri)?))),
        PatternTerm::Term(lit @ GroundTerm::Literal { value, lang, datatype }) => {
            let (lv, dt) = resolve_bare_literal(lit)
                .map(Ok)
                .unwrap_or_else(|| resolve_literal(conn, ctx.abbrev, value, lang.as_deref(), datatype.as_deref()))?;
            Ok(Some(Term::Literal(quadstore_model::Literal::new(lv, dt))))
        }
        PatternTerm::Term(GroundTerm::BlankNode(_)) => {
            Err(CompileError::Unsupported("blank-node literals should already have been normalized to variables".into()))
        }
        PatternTerm::Var(v) if v.starts_with("__bnode_label_") => {
            if let Some(id) = bnode_cache.get(v) {
                return Ok(Some(Term::BlankNode(*id)));
            }
            let id = ctx.abbrev.new_blank_node(conn)?;
            bnode_cache.insert(v.clone(), id);
            Ok(Some(Term::BlankNode(id)))
        }
        PatternTerm::Var(v) if v.starts_with("__newinstanceiri_") => {
            if let Some(id) = bnode_cache.get(v) {
                return Ok(Some(Term::Resource(*id)));
            }
            let class_iri = v
                .strip_prefix("__newinstanceiri_")
                .and_then(|rest| rest.split_once("__"))
                .map(|(_, class_iri)| class_iri)
                .ok_or_else(|| CompileError::Unsupported("malformed NEWINSTANCEIRI synthetic variable".into()))?;
            let id = ctx.abbrev.mint_instance_iri(conn, class_iri)?;
            bnode_cache.insert(v.clone(), id);
            Ok(Some(Term::Resource(id)))
        }
        PatternTerm::Var(v) => Ok(row.get(v).cloned()),
    }
}

fn apply_resolved(
    conn: &Connection,
    store: &Quadstore,
    graph: quadstore_model::Storid,
    s: quadstore_model::Storid,
    p: quadstore_model::Storid,
    object: &Term,
    insert: bool,
) -> CompileResult<usize> {
    let changed = match object {
        Term::Resource(o) | Term::BlankNode(o) => {
            if insert {
                store.add_obj(conn, graph, s, p, *o)?
            } else {
                store.del_obj(conn, Some(graph), Some(s), Some(p), Some(*o))? > 0
            }
        }
        Term::Literal(lit) => {
            if insert {
                store.add_data(conn, graph, s, p, &lit.value, lit.datatype)?
            } else {
                store.del_data_exact(conn, graph, s, p, &lit.value, lit.datatype)?
            }
        }
    };
    Ok(usize::from(changed))
}
