//! Ontology (graph) lifecycle and the thread-local "current ontology" stack (spec.md §3, §9).

use crate::abbreviator::Abbreviator;
use crate::error::{StoreError, StoreResult};
use quadstore_model::Storid;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;

/// Reserves a storid for `iri` and inserts its `ontologies` row. Idempotent: re-creating an
/// already-known ontology IRI returns the existing graph id.
pub fn create_ontology(conn: &Connection, abbrev: &Abbreviator, iri: &str) -> StoreResult<Storid> {
    let graph_id = abbrev.abbreviate(conn, iri)?;
    conn.execute(
        "INSERT OR IGNORE INTO ontologies (graph_id, iri, last_update, dirty) VALUES (?1, ?2, 0, 0)",
        params![graph_id.get(), iri],
    )?;
    Ok(graph_id)
}

/// Removes all quads asserted under `graph` and its `ontologies` row.
pub fn delete_ontology(conn: &Connection, graph: Storid) -> StoreResult<()> {
    conn.execute("DELETE FROM objs WHERE graph = ?1", params![graph.get()])?;
    conn.execute("DELETE FROM datas WHERE graph = ?1", params![graph.get()])?;
    conn.execute(
        "DELETE FROM ontologies WHERE graph_id = ?1",
        params![graph.get()],
    )?;
    Ok(())
}

/// Rewrites every quad's graph column from `source` to `target`, then drops `source`'s row.
pub fn merge_ontologies(conn: &Connection, source: Storid, target: Storid) -> StoreResult<()> {
    if source == target {
        return Ok(());
    }
    conn.execute(
        "UPDATE OR IGNORE objs SET graph = ?2 WHERE graph = ?1",
        params![source.get(), target.get()],
    )?;
    conn.execute("DELETE FROM objs WHERE graph = ?1", params![source.get()])?;
    conn.execute(
        "UPDATE OR IGNORE datas SET graph = ?2 WHERE graph = ?1",
        params![source.get(), target.get()],
    )?;
    conn.execute("DELETE FROM datas WHERE graph = ?1", params![source.get()])?;
    conn.execute(
        "DELETE FROM ontologies WHERE graph_id = ?1",
        params![source.get()],
    )?;
    crate::journal::touch(conn, target)?;
    Ok(())
}

pub fn graph_exists(conn: &Connection, graph: Storid) -> StoreResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM ontologies WHERE graph_id = ?1",
            params![graph.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn ensure_graph_exists(conn: &Connection, graph: Storid) -> StoreResult<()> {
    if graph_exists(conn, graph)? {
        Ok(())
    } else {
        Err(StoreError::UnknownGraph(graph.get()))
    }
}

pub fn iri_for_graph(conn: &Connection, graph: Storid) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT iri FROM ontologies WHERE graph_id = ?1",
            params![graph.get()],
            |row| row.get(0),
        )
        .optional()?)
}

thread_local! {
    static ACTIVE_ONTOLOGY_STACK: RefCell<Vec<Storid>> = const { RefCell::new(Vec::new()) };
}

/// Scoped guard pushing `graph` onto this thread's active-ontology stack; pops it on drop. Used
/// by `with_ontology`-style scoped writes that don't name a target graph explicitly (spec.md
/// §5, §9).
#[must_use = "the ontology is only active while this guard is alive"]
pub struct ActiveOntologyGuard;

impl Drop for ActiveOntologyGuard {
    fn drop(&mut self) {
        ACTIVE_ONTOLOGY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Pushes `graph` as the current thread's active ontology for the lifetime of the returned
/// guard.
#[must_use]
pub fn push_active_ontology(graph: Storid) -> ActiveOntologyGuard {
    ACTIVE_ONTOLOGY_STACK.with(|stack| stack.borrow_mut().push(graph));
    ActiveOntologyGuard
}

/// The innermost (most recently pushed) active ontology on this thread, if any.
#[must_use]
pub fn current_active_ontology() -> Option<Storid> {
    ACTIVE_ONTOLOGY_STACK.with(|stack| stack.borrow().last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_is_lifo_and_thread_local() {
        assert_eq!(current_active_ontology(), None);
        let g1 = Storid(100);
        let g2 = Storid(200);
        {
            let _guard1 = push_active_ontology(g1);
            assert_eq!(current_active_ontology(), Some(g1));
            {
                let _guard2 = push_active_ontology(g2);
                assert_eq!(current_active_ontology(), Some(g2));
            }
            assert_eq!(current_active_ontology(), Some(g1));
        }
        assert_eq!(current_active_ontology(), None);
    }
}
