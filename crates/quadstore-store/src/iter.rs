//! Cursor-backed lazy sequences over indexed lookups (spec.md §4.2, §9): a thin wrapper that
//! holds a prepared statement and releases it on exhaustion, mirroring the teacher's
//! `DecodingQuadIterator` (`other_examples/.../storage-mod.rs.rs`) adapted from a RocksDB cursor
//! to a `rusqlite::Statement`.

use crate::error::StoreResult;
use rusqlite::{Row, Statement};

/// An owned, self-contained iterator over the rows of one prepared statement. Collecting eagerly
/// keeps the lifetime story simple for callers while still only ever materializing what the SQL
/// `WHERE` clause already narrowed down; true streaming (holding the cursor open across `.next()`
/// calls) is left to the compiler crate's executor, which works directly against
/// `rusqlite::Rows`.
pub struct MaterializedIter<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> MaterializedIter<T> {
    pub fn from_statement<F>(
        stmt: &mut Statement<'_>,
        params: impl rusqlite::Params,
        mut row_fn: F,
    ) -> StoreResult<Self>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let rows = stmt.query_map(params, |row| row_fn(row))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(Self {
            items: items.into_iter(),
        })
    }
}

impl<T> Iterator for MaterializedIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }
}
