//! Bidirectional mapping between IRIs and storids (spec.md §4.1).
//!
//! Allocation is serialized by a single process-wide mutex, matching the teacher's own id2str
//! allocation discipline (`other_examples/.../storage-mod.rs.rs`'s ref-counted `id2str` column
//! family), just guarding a SQL upsert instead of a RocksDB merge operator.

use crate::error::{StoreError, StoreResult};
use quadstore_model::{vocab, Storid};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub struct Abbreviator {
    /// Serializes only the allocation critical section (spec.md §4.1, §5).
    alloc_lock: Mutex<()>,
}

impl Default for Abbreviator {
    fn default() -> Self {
        Self::new()
    }
}

impl Abbreviator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            alloc_lock: Mutex::new(()),
        }
    }

    /// Pre-registers the universal vocabulary at fixed low storids. Idempotent: safe to call on
    /// every open.
    pub fn bootstrap(&self, conn: &Connection) -> StoreResult<()> {
        let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());
        for (storid, iri) in vocab::bootstrap_pairs() {
            conn.execute(
                "INSERT OR IGNORE INTO resources (storid, iri, refs) VALUES (?1, ?2, 1)",
                params![storid.get(), iri],
            )?;
        }
        conn.execute(
            "INSERT OR IGNORE INTO counters (name, value) VALUES ('next_storid', ?1)",
            params![vocab::MAX_RESERVED_STORID + 1],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO counters (name, value) VALUES ('next_blank', -1)",
            [],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO counters (name, value) VALUES ('next_lang', 1)",
            [],
        )?;
        Ok(())
    }

    /// Maps an IRI to its storid, allocating a fresh one on first use.
    pub fn abbreviate(&self, conn: &Connection, iri: &str) -> StoreResult<Storid> {
        oxiri::Iri::parse(iri).map_err(|source| StoreError::InvalidIri {
            iri: iri.to_owned(),
            source,
        })?;

        let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(storid) = conn
            .query_row(
                "SELECT storid FROM resources WHERE iri = ?1",
                params![iri],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            return Ok(Storid(storid));
        }

        let next = Self::take_counter(conn, "next_storid", 1)?;
        conn.execute(
            "INSERT INTO resources (storid, iri, refs) VALUES (?1, ?2, 1)",
            params![next, iri],
        )?;
        Ok(Storid(next))
    }

    /// Resolves a storid back to its IRI. Blank nodes never have an entry and resolve to `None`.
    pub fn unabbreviate(&self, conn: &Connection, storid: Storid) -> StoreResult<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT iri FROM resources WHERE storid = ?1",
                params![storid.get()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Allocates a fresh, never-reused negative storid for a blank node.
    pub fn new_blank_node(&self, conn: &Connection) -> StoreResult<Storid> {
        let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());
        let next = Self::take_counter(conn, "next_blank", -1)?;
        Ok(Storid(next))
    }

    /// Interns a language tag (e.g. `"en"`), returning its small positive tag-id used to build a
    /// [`quadstore_model::DatatypeId::lang`] sentinel.
    pub fn intern_lang(&self, conn: &Connection, tag: &str) -> StoreResult<i64> {
        let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = conn
            .query_row(
                "SELECT tag_id FROM lang_tags WHERE tag = ?1",
                params![tag],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            return Ok(id);
        }
        let next = Self::take_counter(conn, "next_lang", 1)?;
        conn.execute(
            "INSERT INTO lang_tags (tag_id, tag) VALUES (?1, ?2)",
            params![next, tag],
        )?;
        Ok(next)
    }

    /// Mints a fresh IRI in `class_iri`'s namespace (its IRI up to the final `#`/`/`) suffixed
    /// with a per-class counter, per the `NEWINSTANCEIRI(class)` update extension
    /// (SPEC_FULL.md §4.6.5-§4.6.6). Deterministic given the counter's current value, durable
    /// across opens since the counter lives in the `counters` table like `next_blank`/`next_lang`.
    pub fn mint_instance_iri(&self, conn: &Connection, class_iri: &str) -> StoreResult<Storid> {
        let key = format!("newinstance:{class_iri}");
        let next = {
            let _guard = self.alloc_lock.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute("INSERT OR IGNORE INTO counters (name, value) VALUES (?1, 1)", params![key])?;
            Self::take_counter(conn, &key, 1)?
        };
        let (namespace, local_name) = split_namespace(class_iri);
        self.abbreviate(conn, &format!("{namespace}{local_name}{next}"))
    }

    pub fn lang_tag(&self, conn: &Connection, tag_id: i64) -> StoreResult<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT tag FROM lang_tags WHERE tag_id = ?1",
                params![tag_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Reads a counter and advances it by `step` (must be called under `alloc_lock`).
    fn take_counter(conn: &Connection, name: &str, step: i64) -> StoreResult<i64> {
        let current: i64 = conn.query_row(
            "SELECT value FROM counters WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        conn.execute(
            "UPDATE counters SET value = ?2 WHERE name = ?1",
            params![name, current + step],
        )?;
        Ok(current)
    }
}

/// Splits a class IRI into its namespace (everything up to and including the final `#`/`/`) and
/// local name, falling back to a generic `"instance"` local name for a namespace-less IRI.
fn split_namespace(iri: &str) -> (&str, &str) {
    match iri.rfind(['#', '/']) {
        Some(pos) => (&iri[..=pos], &iri[pos + 1..]),
        None => (iri, "instance"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CREATE_SCHEMA;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        conn
    }

    #[test]
    fn abbreviate_is_injective_and_stable() {
        let conn = fresh_conn();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();

        let a = ab.abbreviate(&conn, "http://example.com/a").unwrap();
        let a2 = ab.abbreviate(&conn, "http://example.com/a").unwrap();
        let b = ab.abbreviate(&conn, "http://example.com/b").unwrap();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(ab.unabbreviate(&conn, a).unwrap().as_deref(), Some("http://example.com/a"));
    }

    #[test]
    fn blank_nodes_are_negative_and_never_resolve() {
        let conn = fresh_conn();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();

        let b1 = ab.new_blank_node(&conn).unwrap();
        let b2 = ab.new_blank_node(&conn).unwrap();
        assert!(b1.is_blank_node());
        assert!(b2.is_blank_node());
        assert_ne!(b1, b2);
        assert_eq!(ab.unabbreviate(&conn, b1).unwrap(), None);
    }

    #[test]
    fn mint_instance_iri_is_deterministic_and_distinct_per_class() {
        let conn = fresh_conn();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();

        let a1 = ab.mint_instance_iri(&conn, "http://example.org/onto#Person").unwrap();
        let a2 = ab.mint_instance_iri(&conn, "http://example.org/onto#Person").unwrap();
        let b1 = ab.mint_instance_iri(&conn, "http://example.org/onto#Dog").unwrap();
        assert_ne!(a1, a2);
        assert_eq!(ab.unabbreviate(&conn, a1).unwrap().as_deref(), Some("http://example.org/onto#Person1"));
        assert_eq!(ab.unabbreviate(&conn, a2).unwrap().as_deref(), Some("http://example.org/onto#Person2"));
        assert_eq!(ab.unabbreviate(&conn, b1).unwrap().as_deref(), Some("http://example.org/onto#Dog1"));
    }

    #[test]
    fn universal_vocabulary_is_preregistered() {
        let conn = fresh_conn();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();
        assert_eq!(
            ab.abbreviate(&conn, "http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
                .unwrap(),
            vocab::RDF_TYPE
        );
    }

    #[test]
    fn rejects_malformed_iri() {
        let conn = fresh_conn();
        let ab = Abbreviator::new();
        ab.bootstrap(&conn).unwrap();
        assert!(ab.abbreviate(&conn, "not a valid iri").is_err());
    }
}
