//! The facade `Store` (SPEC_FULL.md §4.10, §5): owns the single write connection, a pool of
//! read-only connections, and the compiler crate's prepared-query cache, and wires
//! [`quadstore_compiler::compile_select_query`]/[`quadstore_compiler::run_update`] together for
//! callers that just want to hand SPARQL text to a store.

use crate::config::Config;
use crate::error::{QuadstoreError, QuadstoreResult};
use crate::ontology::Ontology;
use crate::pool::{ReadPool, Target};
use quadstore_compiler::{PreparedQuery, PreparedQueryCache, QuerySolution, UpdateSummary};
use quadstore_model::Storid;
use quadstore_store::ntriples::{DirectLoader, load_ntriples};
use quadstore_store::ontology::{self as ontology_ops, ActiveOntologyGuard};
use quadstore_store::{journal, Quadstore, StoreError};
use std::sync::{Arc, Mutex};
use tracing::instrument;

pub struct Store {
    quadstore: Quadstore,
    write_conn: Mutex<rusqlite::Connection>,
    read_pool: ReadPool,
    cache: PreparedQueryCache,
    config: Config,
}

impl Store {
    /// Opens (creating if necessary) a store backed by `config.storage`, applying the schema and
    /// bootstrapping the abbreviator on first use.
    #[instrument(skip(config))]
    pub fn open(config: Config) -> QuadstoreResult<Self> {
        let target = Target::resolve(&config.storage);
        let write_conn = target.open(config.busy_timeout)?;
        let quadstore = Quadstore::new();
        quadstore.open(&write_conn)?;
        let read_pool = ReadPool::new(target, config.read_pool_size.max(1), config.busy_timeout);
        Ok(Self {
            quadstore,
            write_conn: Mutex::new(write_conn),
            read_pool,
            cache: PreparedQueryCache::new(),
            config,
        })
    }

    /// Registers (or returns, if already known) the ontology named by `iri` (spec.md §3).
    #[instrument(skip(self))]
    pub fn create_ontology(&self, iri: &str) -> QuadstoreResult<Ontology> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        let graph = ontology_ops::create_ontology(&conn, &self.quadstore.abbrev, iri)?;
        Ok(Ontology { graph, iri: iri.to_string() })
    }

    /// Looks up an already-registered ontology by IRI, returning `None` if it was never created.
    pub fn ontology(&self, iri: &str) -> QuadstoreResult<Option<Ontology>> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        let graph = self.quadstore.abbrev.abbreviate(&conn, iri)?;
        if ontology_ops::graph_exists(&conn, graph)? {
            Ok(Some(Ontology { graph, iri: iri.to_string() }))
        } else {
            Ok(None)
        }
    }

    /// Removes every quad asserted under `ontology` and its registration row.
    #[instrument(skip(self))]
    pub fn delete_ontology(&self, ontology: &Ontology) -> QuadstoreResult<()> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        ontology_ops::delete_ontology(&conn, ontology.graph)?;
        Ok(())
    }

    /// Rewrites every quad asserted under `source` onto `target` and drops `source`'s row
    /// (spec.md §3 "ontology merge").
    #[instrument(skip(self))]
    pub fn merge_ontologies(&self, source: &Ontology, target: &Ontology) -> QuadstoreResult<()> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        ontology_ops::merge_ontologies(&conn, source.graph, target.graph)?;
        Ok(())
    }

    /// Pushes `ontology` onto this thread's active-ontology stack for the lifetime of the
    /// returned guard (spec.md §9's `with onto:` scoping, carried over to Rust as a guard type).
    #[must_use]
    pub fn enter(&self, ontology: &Ontology) -> ActiveOntologyGuard {
        ontology_ops::push_active_ontology(ontology.graph)
    }

    /// Compiles `sparql` against `graph_scope`, reusing a cached plan if this exact
    /// `(source, graph_scope)` pair has been prepared since the last write anywhere in the store
    /// (spec.md §4.7). The cache key folds in the current world fingerprint so that a plan
    /// compiled before an insert or delete is never handed back stale afterwards — in particular
    /// so that `*STATIC` property paths, which bake concrete closure values into the compiled SQL
    /// at prepare time, recompute once new matching triples exist.
    #[instrument(skip(self, sparql))]
    pub fn prepare_sparql(&self, sparql: &str, graph_scope: &[Storid]) -> QuadstoreResult<Arc<PreparedQuery>> {
        let scope: Vec<i64> = graph_scope.iter().map(|s| s.get()).collect();
        let conn = self.read_pool.checkout()?;
        let fingerprint = journal::get_world_fingerprint(&conn)?;
        let prepared = self.cache.get_or_compile(sparql, &scope, fingerprint, || {
            quadstore_compiler::compile_select_query(&conn, &self.quadstore.abbrev, sparql, scope.clone())
        })?;
        Ok(prepared)
    }

    /// Prepares (or reuses) and runs a `SELECT` query, returning every solution row.
    #[instrument(skip(self, sparql))]
    pub fn sparql(&self, sparql: &str, graph_scope: &[Storid]) -> QuadstoreResult<Vec<QuerySolution>> {
        let prepared = self.prepare_sparql(sparql, graph_scope)?;
        let conn = self.read_pool.checkout()?;
        Ok(quadstore_compiler::execute_select(&conn, &prepared)?)
    }

    /// Like [`Store::sparql`], but resolves every binding back to an IRI/blank-node label/literal
    /// lexical form instead of leaving it as a storid-based [`quadstore_model::Term`]. Useful for
    /// callers (tests, REPLs) that want human-readable values without going through one of the
    /// wire encodings.
    #[instrument(skip(self, sparql))]
    pub fn sparql_resolved(
        &self,
        sparql: &str,
        graph_scope: &[Storid],
    ) -> QuadstoreResult<Vec<std::collections::BTreeMap<String, quadstore_results::ResolvedTerm>>> {
        let prepared = self.prepare_sparql(sparql, graph_scope)?;
        let conn = self.read_pool.checkout()?;
        let rows = quadstore_compiler::execute_select(&conn, &prepared)?;
        let resolver = quadstore_results::TermResolver::new(&conn, &self.quadstore.abbrev);
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(var, term)| Ok((var, resolver.resolve(&term)?)))
                    .collect::<QuadstoreResult<std::collections::BTreeMap<_, _>>>()
            })
            .collect()
    }

    /// Prepares, runs, and writes `sparql`'s results in `format` directly to `out`
    /// (SPEC_FULL.md §6's `quadstore-results` wire encodings), used by the CLI's `query`
    /// subcommand so it never needs to reach past the facade for a raw connection/abbreviator.
    #[instrument(skip(self, sparql, out))]
    pub fn sparql_write(
        &self,
        out: &mut impl std::io::Write,
        format: quadstore_results::ResultFormat,
        sparql: &str,
        graph_scope: &[Storid],
    ) -> QuadstoreResult<()> {
        let prepared = self.prepare_sparql(sparql, graph_scope)?;
        let conn = self.read_pool.checkout()?;
        let rows = quadstore_compiler::execute_select(&conn, &prepared)?;
        let resolver = quadstore_results::TermResolver::new(&conn, &self.quadstore.abbrev);
        quadstore_results::write_results(out, format, &prepared.output_vars, &rows, &resolver)?;
        Ok(())
    }

    /// Runs every `(sparql, graph_scope)` pair, in parallel when `config.parallel` is set, each
    /// on its own pooled read connection (spec.md §5). Refuses to run while any ontology has
    /// uncommitted writes, since a concurrent reader could otherwise observe a half-applied
    /// update depending on thread scheduling.
    #[instrument(skip(self, queries))]
    pub fn execute_many(&self, queries: &[(&str, Vec<Storid>)]) -> QuadstoreResult<Vec<Vec<QuerySolution>>> {
        {
            let conn = self.write_conn.lock().expect("write connection mutex poisoned");
            if journal::any_dirty(&conn)? {
                return Err(QuadstoreError::from(StoreError::DirtyState));
            }
        }
        if self.config.parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = queries
                    .iter()
                    .map(|(sparql, graph_scope)| scope.spawn(move || self.sparql(sparql, graph_scope)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("query thread panicked"))
                    .collect()
            })
        } else {
            queries.iter().map(|(sparql, graph_scope)| self.sparql(sparql, graph_scope)).collect()
        }
    }

    /// Parses, compiles, and runs a SPARQL update against `ontology` inside a single write
    /// transaction, clearing its dirty flag on a successful commit (spec.md §4.6.6).
    #[instrument(skip(self, sparql))]
    pub fn update(&self, ontology: &Ontology, sparql: &str, graph_scope: &[Storid]) -> QuadstoreResult<UpdateSummary> {
        let scope: Vec<i64> = graph_scope.iter().map(|s| s.get()).collect();
        let mut conn = self.write_conn.lock().expect("write connection mutex poisoned");
        let tx = conn.transaction()?;
        let summary = quadstore_compiler::run_update(&tx, &self.quadstore, sparql, ontology.graph, scope)?;
        tx.commit()?;
        journal::clear_dirty(&conn, ontology.graph)?;
        Ok(summary)
    }

    /// Streams the restricted N-Triples subset in `text` into `ontology` (SPEC_FULL.md §4.9,
    /// §6's `load` CLI subcommand), clearing the dirty flag it sets once every line has committed.
    #[instrument(skip(self, text))]
    pub fn load_ntriples(&self, ontology: &Ontology, text: &str) -> QuadstoreResult<usize> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        let mut loader = DirectLoader { conn: &conn, store: &self.quadstore };
        let count = load_ntriples(&mut loader, ontology.graph, text)?;
        journal::clear_dirty(&conn, ontology.graph)?;
        Ok(count)
    }

    /// Lists every registered ontology IRI alongside its `last_update` counter
    /// (SPEC_FULL.md §6's `ontologies` CLI subcommand).
    pub fn list_ontologies(&self) -> QuadstoreResult<Vec<(String, i64)>> {
        let conn = self.write_conn.lock().expect("write connection mutex poisoned");
        let mut stmt = conn.prepare("SELECT iri, last_update FROM ontologies ORDER BY iri")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Evicts every cached prepared query. Plans embedding `*STATIC` closures already
    /// self-invalidate on write (spec.md §4.7); this exists for callers that want a hard reset,
    /// e.g. after a bulk load.
    pub fn clear_query_cache(&self) {
        self.cache.clear();
    }
}
