//! SPARQL algebra to SQL translator, prepared-query cache, and executor (spec.md §4.6-§4.7).
//!
//! The pipeline a caller drives: parse ([`quadstore_sparql::Parser`]) → normalize
//! ([`quadstore_sparql::Normalizer`]) → compile ([`translate`]/[`query`]) → execute
//! ([`executor`]/[`update`]). [`compile_select_query`] and [`run_update`] wire the whole pipeline
//! together for the common case; callers that want to reuse a [`cache::PreparedQueryCache`]
//! across repeated queries should call [`query::compile_select`] directly and own the cache
//! themselves (the facade crate does this).

pub mod cache;
pub mod error;
pub mod executor;
pub mod expr;
pub mod functions;
pub mod literal;
pub mod path;
pub mod query;
pub mod translate;
pub mod update;
pub mod vars;

pub use cache::PreparedQueryCache;
pub use error::{CompileError, CompileResult};
pub use executor::{execute_select, QuerySolution};
pub use query::PreparedQuery;
pub use translate::TranslateCtx;
pub use update::{execute_update, UpdateSummary};

use quadstore_sparql::algebra::Query;
use quadstore_sparql::{Normalizer, Parser};
use quadstore_store::{Abbreviator, Quadstore};
use rusqlite::Connection;

/// Parses, normalizes, and compiles a SPARQL `SELECT` query against the given graph scope,
/// without touching the prepared-query cache.
pub fn compile_select_query(conn: &Connection, abbrev: &Abbreviator, sparql: &str, graph_scope: Vec<i64>) -> CompileResult<PreparedQuery> {
    let parsed = Parser::parse(sparql)?;
    let normalizer = Normalizer::new(&parsed, conn, abbrev);
    let query = normalizer.normalize(parsed.query)?;
    let Query::Select(select) = query else {
        return Err(CompileError::Unsupported("expected a SELECT query".into()));
    };
    let ctx = TranslateCtx::new(conn, abbrev, graph_scope);
    query::compile_select(&ctx, &select)
}

/// Parses, normalizes, and runs a SPARQL update against `default_graph`.
pub fn run_update(
    conn: &Connection,
    store: &Quadstore,
    sparql: &str,
    default_graph: quadstore_model::Storid,
    graph_scope: Vec<i64>,
) -> CompileResult<UpdateSummary> {
    let parsed = Parser::parse(sparql)?;
    let normalizer = Normalizer::new(&parsed, conn, &store.abbrev);
    let query = normalizer.normalize(parsed.query)?;
    let Query::Update(update) = query else {
        return Err(CompileError::Unsupported("expected an UPDATE query".into()));
    };
    let ctx = TranslateCtx::new(conn, &store.abbrev, graph_scope);
    update::execute_update(conn, store, &ctx, default_graph, &update)
}
