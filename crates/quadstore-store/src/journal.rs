//! Per-ontology last-update counter and dirty flag (spec.md §4.3).
//!
//! `last_update` is a monotonically increasing counter, not a wall-clock timestamp, so cache
//! invalidation comparisons are never subject to clock skew (SPEC_FULL.md §4.3).

use crate::error::StoreResult;
use quadstore_model::Storid;
use rusqlite::{params, Connection};

/// Bumps `ontologies.last_update` for `graph` and sets its dirty flag. Called by every mutating
/// quadstore operation.
pub fn touch(conn: &Connection, graph: Storid) -> StoreResult<()> {
    conn.execute(
        "UPDATE ontologies SET last_update = last_update + 1, dirty = 1 WHERE graph_id = ?1",
        params![graph.get()],
    )?;
    Ok(())
}

/// Reads the current `last_update` counter for `graph`, used by the prepared-query cache to
/// decide whether a cached `*STATIC` closure must be recomputed.
pub fn get_last_update_time(conn: &Connection, graph: Storid) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT last_update FROM ontologies WHERE graph_id = ?1",
        params![graph.get()],
        |row| row.get(0),
    )?)
}

/// Sums `last_update` across every ontology currently in the store: a coarse fingerprint used to
/// invalidate `*STATIC` closures that span the union graph.
pub fn get_world_fingerprint(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COALESCE(SUM(last_update), 0) FROM ontologies", [], |row| {
        row.get(0)
    })?)
}

pub fn clear_dirty(conn: &Connection, graph: Storid) -> StoreResult<()> {
    conn.execute(
        "UPDATE ontologies SET dirty = 0 WHERE graph_id = ?1",
        params![graph.get()],
    )?;
    Ok(())
}

pub fn is_dirty(conn: &Connection, graph: Storid) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT dirty FROM ontologies WHERE graph_id = ?1",
        params![graph.get()],
        |row| row.get::<_, i64>(0),
    )? != 0)
}

/// True if any ontology in the store has uncommitted changes (spec.md §5 "DirtyStateError").
pub fn any_dirty(conn: &Connection) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM ontologies WHERE dirty != 0",
        [],
        |row| row.get::<_, i64>(0),
    )? > 0)
}
