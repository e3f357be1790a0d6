//! The quadstore proper (spec.md §4.2): CRUD over `objs`/`datas`, indexed lookups, and RDF-list
//! walking. Every operation takes an explicit `&Connection` so the facade crate is free to pool
//! connections however it likes (spec.md §5); this crate only owns the [`Abbreviator`] and the
//! SQL shape of each operation.

use crate::abbreviator::Abbreviator;
use crate::error::{StoreError, StoreResult};
use crate::iter::MaterializedIter;
use crate::journal;
use crate::predicate;
use quadstore_model::vocab;
use quadstore_model::{DatatypeId, LiteralValue, Storid};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

pub struct Quadstore {
    pub abbrev: Abbreviator,
}

impl Default for Quadstore {
    fn default() -> Self {
        Self::new()
    }
}

fn lv_to_sql(value: &LiteralValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        LiteralValue::Text(s) => Value::Text(s.clone()),
        LiteralValue::Int(i) => Value::Integer(*i),
        LiteralValue::Float(f) => Value::Real(*f),
        LiteralValue::Bool(b) => Value::Integer(i64::from(*b)),
    }
}

impl Quadstore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            abbrev: Abbreviator::new(),
        }
    }

    pub fn open(&self, conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(crate::schema::CREATE_SCHEMA)?;
        self.abbrev.bootstrap(conn)?;
        Ok(())
    }

    // ---- object quads -----------------------------------------------------------------

    /// Inserts `(g,s,p,o)`. Idempotent: re-inserting an identical row is a no-op and does not
    /// bump the journal (spec.md §7: "Inserting a duplicate quad is not an error").
    pub fn add_obj(&self, conn: &Connection, g: Storid, s: Storid, p: Storid, o: Storid) -> StoreResult<bool> {
        predicate::record_object_use(conn, p)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO objs (graph, s, p, o) VALUES (?1, ?2, ?3, ?4)",
            params![g.get(), s.get(), p.get(), o.get()],
        )?;
        if inserted > 0 {
            journal::touch(conn, g)?;
        }
        Ok(inserted > 0)
    }

    pub fn add_data(
        &self,
        conn: &Connection,
        g: Storid,
        s: Storid,
        p: Storid,
        value: &LiteralValue,
        dtype: DatatypeId,
    ) -> StoreResult<bool> {
        predicate::record_data_use(conn, p)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO datas (graph, s, p, value, dtype) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![g.get(), s.get(), p.get(), lv_to_sql(value), dtype.0],
        )?;
        if inserted > 0 {
            journal::touch(conn, g)?;
        }
        Ok(inserted > 0)
    }

    /// Deletes object quads matching the given pattern; `None` fields match any value.
    pub fn del_obj(
        &self,
        conn: &Connection,
        g: Option<Storid>,
        s: Option<Storid>,
        p: Option<Storid>,
        o: Option<Storid>,
    ) -> StoreResult<usize> {
        let (clause, args) = pattern_clause(&[("graph", g), ("s", s), ("p", p), ("o", o)]);
        let affected_graphs = if g.is_none() {
            self.distinct_graphs_matching(conn, "objs", &clause, &args)?
        } else {
            g.into_iter().collect()
        };
        let sql = format!("DELETE FROM objs{clause}");
        let n = conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?;
        for graph in affected_graphs {
            journal::touch(conn, graph)?;
        }
        Ok(n)
    }

    pub fn del_data(
        &self,
        conn: &Connection,
        g: Option<Storid>,
        s: Option<Storid>,
        p: Option<Storid>,
    ) -> StoreResult<usize> {
        let (clause, args) = pattern_clause(&[("graph", g), ("s", s), ("p", p)]);
        let affected_graphs = if g.is_none() {
            self.distinct_graphs_matching(conn, "datas", &clause, &args)?
        } else {
            g.into_iter().collect()
        };
        let sql = format!("DELETE FROM datas{clause}");
        let n = conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?;
        for graph in affected_graphs {
            journal::touch(conn, graph)?;
        }
        Ok(n)
    }

    /// Deletes a single exact data triple `(g,s,p,value,dtype)`, unlike [`Self::del_data`] which
    /// matches every data triple sharing a `(g,s,p)` prefix regardless of its literal value.
    pub fn del_data_exact(
        &self,
        conn: &Connection,
        g: Storid,
        s: Storid,
        p: Storid,
        value: &LiteralValue,
        dtype: DatatypeId,
    ) -> StoreResult<bool> {
        let n = conn.execute(
            "DELETE FROM datas WHERE graph=?1 AND s=?2 AND p=?3 AND value=?4 AND dtype=?5",
            params![g.get(), s.get(), p.get(), lv_to_sql(value), dtype.0],
        )?;
        if n > 0 {
            journal::touch(conn, g)?;
        }
        Ok(n > 0)
    }

    fn distinct_graphs_matching(
        &self,
        conn: &Connection,
        table: &str,
        clause: &str,
        args: &[i64],
    ) -> StoreResult<Vec<Storid>> {
        let sql = format!("SELECT DISTINCT graph FROM {table}{clause}");
        let mut stmt = conn.prepare(&sql)?;
        let iter = MaterializedIter::from_statement(&mut stmt, rusqlite::params_from_iter(args.iter()), |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(iter.map(Storid).collect())
    }

    pub fn has_obj(&self, conn: &Connection, g: Storid, s: Storid, p: Storid, o: Storid) -> StoreResult<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM objs WHERE graph=?1 AND s=?2 AND p=?3 AND o=?4",
                params![g.get(), s.get(), p.get(), o.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }

    pub fn has_data(
        &self,
        conn: &Connection,
        g: Storid,
        s: Storid,
        p: Storid,
        value: &LiteralValue,
        dtype: DatatypeId,
    ) -> StoreResult<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM datas WHERE graph=?1 AND s=?2 AND p=?3 AND value=?4 AND dtype=?5",
                params![g.get(), s.get(), p.get(), lv_to_sql(value), dtype.0],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }

    // ---- indexed lookups ----------------------------------------------------------------

    /// Objects of object-valued triples matching `(graph, s, p)`.
    pub fn get_triples_sp_o(&self, conn: &Connection, g: Storid, s: Storid, p: Storid) -> StoreResult<Vec<Storid>> {
        let mut stmt = conn.prepare("SELECT o FROM objs WHERE graph=?1 AND s=?2 AND p=?3")?;
        let iter = MaterializedIter::from_statement(&mut stmt, params![g.get(), s.get(), p.get()], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(iter.map(Storid).collect())
    }

    /// Same as [`Self::get_triples_sp_o`] but across every graph (the `_q` union-graph variant,
    /// spec.md §4.2).
    pub fn get_triples_sp_o_q(&self, conn: &Connection, s: Storid, p: Storid) -> StoreResult<Vec<Storid>> {
        let mut stmt = conn.prepare("SELECT o FROM objs WHERE s=?1 AND p=?2")?;
        let iter = MaterializedIter::from_statement(&mut stmt, params![s.get(), p.get()], |row| row.get::<_, i64>(0))?;
        Ok(iter.map(Storid).collect())
    }

    /// `(value, dtype)` pairs of data-valued triples matching `(graph, s, p)`.
    pub fn get_triples_sp_od(
        &self,
        conn: &Connection,
        g: Storid,
        s: Storid,
        p: Storid,
    ) -> StoreResult<Vec<(LiteralValue, DatatypeId)>> {
        let mut stmt = conn.prepare("SELECT value, dtype FROM datas WHERE graph=?1 AND s=?2 AND p=?3")?;
        MaterializedIter::from_statement(&mut stmt, params![g.get(), s.get(), p.get()], |row| {
            Ok((row_to_literal_value(row)?, DatatypeId(row.get::<_, i64>(1)?)))
        })
        .map(Iterator::collect)
    }

    /// Subjects of object-valued triples matching `(graph, p, o)`.
    pub fn get_triples_po_s(&self, conn: &Connection, g: Storid, p: Storid, o: Storid) -> StoreResult<Vec<Storid>> {
        let mut stmt = conn.prepare("SELECT s FROM objs WHERE graph=?1 AND p=?2 AND o=?3")?;
        let iter = MaterializedIter::from_statement(&mut stmt, params![g.get(), p.get(), o.get()], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(iter.map(Storid).collect())
    }

    pub fn get_triples_po_s_q(&self, conn: &Connection, p: Storid, o: Storid) -> StoreResult<Vec<Storid>> {
        let mut stmt = conn.prepare("SELECT s FROM objs WHERE p=?1 AND o=?2")?;
        let iter = MaterializedIter::from_statement(&mut stmt, params![p.get(), o.get()], |row| row.get::<_, i64>(0))?;
        Ok(iter.map(Storid).collect())
    }

    /// Every `(p, o)` object pair and `(p, value, dtype)` data triple for a given subject.
    pub fn get_triples_s_pod(
        &self,
        conn: &Connection,
        g: Storid,
        s: Storid,
    ) -> StoreResult<(Vec<(Storid, Storid)>, Vec<(Storid, LiteralValue, DatatypeId)>)> {
        let mut ostmt = conn.prepare("SELECT p, o FROM objs WHERE graph=?1 AND s=?2")?;
        let objs = MaterializedIter::from_statement(&mut ostmt, params![g.get(), s.get()], |row| {
            Ok((Storid(row.get::<_, i64>(0)?), Storid(row.get::<_, i64>(1)?)))
        })?
        .collect();

        let mut dstmt = conn.prepare("SELECT p, value, dtype FROM datas WHERE graph=?1 AND s=?2")?;
        let datas = MaterializedIter::from_statement(&mut dstmt, params![g.get(), s.get()], |row| {
            Ok((
                Storid(row.get::<_, i64>(0)?),
                row_to_literal_value(row)?,
                DatatypeId(row.get::<_, i64>(2)?),
            ))
        })?
        .collect();

        Ok((objs, datas))
    }

    /// Runs `ANALYZE` to refresh the statistics the SQLite query planner uses for the compiled
    /// SQL the translator crate emits (spec.md §4.2).
    pub fn analyze(&self, conn: &Connection) -> StoreResult<()> {
        conn.execute_batch("ANALYZE")?;
        Ok(())
    }

    // ---- RDF collections ------------------------------------------------------------------

    /// Walks an RDF collection (`rdf:first`/`rdf:rest`) rooted at `head`, returning its elements
    /// in order. Finite by construction: a visited-set bounds the walk so a cyclic blank-node
    /// graph fails with `MalformedList` rather than looping forever (spec.md §4.2, §9).
    pub fn parse_list(&self, conn: &Connection, g: Storid, head: Storid) -> StoreResult<Vec<Storid>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = head;
        loop {
            if cursor == vocab::RDF_NIL {
                return Ok(out);
            }
            if !visited.insert(cursor) {
                return Err(StoreError::MalformedList(cursor.get(), "cyclic rdf:rest chain"));
            }
            let firsts = self.get_triples_sp_o(conn, g, cursor, vocab::RDF_FIRST)?;
            let Some(first) = firsts.into_iter().next() else {
                return Err(StoreError::MalformedList(cursor.get(), "list node has no rdf:first"));
            };
            out.push(first);
            let rests = self.get_triples_sp_o(conn, g, cursor, vocab::RDF_REST)?;
            let Some(rest) = rests.into_iter().next() else {
                return Err(StoreError::MalformedList(cursor.get(), "list node has no rdf:rest"));
            };
            cursor = rest;
        }
    }

    /// Same walk, but returns `(node, first)` pairs so a caller can also see each intermediate
    /// list-cell storid (needed when rewriting or deleting the collection in place).
    pub fn parse_list_as_rdf(&self, conn: &Connection, g: Storid, head: Storid) -> StoreResult<Vec<(Storid, Storid)>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = head;
        loop {
            if cursor == vocab::RDF_NIL {
                return Ok(out);
            }
            if !visited.insert(cursor) {
                return Err(StoreError::MalformedList(cursor.get(), "cyclic rdf:rest chain"));
            }
            let firsts = self.get_triples_sp_o(conn, g, cursor, vocab::RDF_FIRST)?;
            let Some(first) = firsts.into_iter().next() else {
                return Err(StoreError::MalformedList(cursor.get(), "list node has no rdf:first"));
            };
            out.push((cursor, first));
            let rests = self.get_triples_sp_o(conn, g, cursor, vocab::RDF_REST)?;
            let Some(rest) = rests.into_iter().next() else {
                return Err(StoreError::MalformedList(cursor.get(), "list node has no rdf:rest"));
            };
            cursor = rest;
        }
    }
}

fn row_to_literal_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<LiteralValue> {
    use rusqlite::types::ValueRef;
    Ok(match row.get_ref(0)? {
        ValueRef::Integer(i) => LiteralValue::Int(i),
        ValueRef::Real(f) => LiteralValue::Float(f),
        ValueRef::Text(t) => LiteralValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) | ValueRef::Null => LiteralValue::Text(String::new()),
    })
}

/// Builds a ` WHERE ...` clause (or empty string) plus its positional args for a pattern where
/// `None` fields are left unconstrained.
fn pattern_clause(fields: &[(&str, Option<Storid>)]) -> (String, Vec<i64>) {
    let mut conds = Vec::new();
    let mut args = Vec::new();
    for (i, (name, value)) in fields.iter().enumerate() {
        if let Some(v) = value {
            conds.push(format!("{name}=?{}", i + 1));
            args.push(v.get());
        }
    }
    if conds.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", conds.join(" AND ")), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Connection, Quadstore, Storid) {
        let conn = Connection::open_in_memory().unwrap();
        let qs = Quadstore::new();
        qs.open(&conn).unwrap();
        let g = crate::ontology::create_ontology(&conn, &qs.abbrev, "http://example.com/onto").unwrap();
        (conn, qs, g)
    }

    #[test]
    fn insert_is_idempotent() {
        let (conn, qs, g) = fresh();
        let a = qs.abbrev.abbreviate(&conn, "http://example.com/a").unwrap();
        let p = qs.abbrev.abbreviate(&conn, "http://example.com/p").unwrap();
        let b = qs.abbrev.abbreviate(&conn, "http://example.com/b").unwrap();

        assert!(qs.add_obj(&conn, g, a, p, b).unwrap());
        assert!(!qs.add_obj(&conn, g, a, p, b).unwrap());
        assert!(qs.has_obj(&conn, g, a, p, b).unwrap());
        assert_eq!(qs.get_triples_sp_o(&conn, g, a, p).unwrap(), vec![b]);
    }

    #[test]
    fn deletion_matches_pattern_with_nulls() {
        let (conn, qs, g) = fresh();
        let a = qs.abbrev.abbreviate(&conn, "http://example.com/a").unwrap();
        let p = qs.abbrev.abbreviate(&conn, "http://example.com/p").unwrap();
        let b1 = qs.abbrev.abbreviate(&conn, "http://example.com/b1").unwrap();
        let b2 = qs.abbrev.abbreviate(&conn, "http://example.com/b2").unwrap();
        qs.add_obj(&conn, g, a, p, b1).unwrap();
        qs.add_obj(&conn, g, a, p, b2).unwrap();

        let n = qs.del_obj(&conn, None, Some(a), Some(p), None).unwrap();
        assert_eq!(n, 2);
        assert!(qs.get_triples_sp_o(&conn, g, a, p).unwrap().is_empty());
    }

    #[test]
    fn parse_list_walks_in_order() {
        let (conn, qs, g) = fresh();
        let item1 = qs.abbrev.abbreviate(&conn, "http://example.com/i1").unwrap();
        let item2 = qs.abbrev.abbreviate(&conn, "http://example.com/i2").unwrap();
        let cell1 = qs.abbrev.new_blank_node(&conn).unwrap();
        let cell2 = qs.abbrev.new_blank_node(&conn).unwrap();

        qs.add_obj(&conn, g, cell1, vocab::RDF_FIRST, item1).unwrap();
        qs.add_obj(&conn, g, cell1, vocab::RDF_REST, cell2).unwrap();
        qs.add_obj(&conn, g, cell2, vocab::RDF_FIRST, item2).unwrap();
        qs.add_obj(&conn, g, cell2, vocab::RDF_REST, vocab::RDF_NIL).unwrap();

        assert_eq!(qs.parse_list(&conn, g, cell1).unwrap(), vec![item1, item2]);
    }

    #[test]
    fn parse_list_detects_cycles() {
        let (conn, qs, g) = fresh();
        let item1 = qs.abbrev.abbreviate(&conn, "http://example.com/i1").unwrap();
        let cell1 = qs.abbrev.new_blank_node(&conn).unwrap();
        qs.add_obj(&conn, g, cell1, vocab::RDF_FIRST, item1).unwrap();
        qs.add_obj(&conn, g, cell1, vocab::RDF_REST, cell1).unwrap();

        assert!(matches!(
            qs.parse_list(&conn, g, cell1),
            Err(StoreError::MalformedList(_, _))
        ));
    }
}
