//! The predicate-kind table: "A predicate is either object-valued or data-valued across the
//! entire store (enforced on first use; mixing raises an error at query-compile time)" —
//! spec.md §3.

use crate::error::{StoreError, StoreResult};
use quadstore_model::{PredicateKind, Storid};
use rusqlite::{params, Connection, OptionalExtension};

pub fn get_kind(conn: &Connection, storid: Storid) -> StoreResult<PredicateKind> {
    Ok(conn
        .query_row(
            "SELECT is_object, is_data, is_annotation, is_functional FROM predicate_kinds WHERE storid = ?1",
            params![storid.get()],
            |row| {
                Ok(PredicateKind {
                    is_object: row.get::<_, i64>(0)? != 0,
                    is_data: row.get::<_, i64>(1)? != 0,
                    is_annotation: row.get::<_, i64>(2)? != 0,
                    is_functional: row.get::<_, i64>(3)? != 0,
                })
            },
        )
        .optional()?
        .unwrap_or_default())
}

fn record_use(conn: &Connection, storid: Storid, as_object: bool) -> StoreResult<()> {
    let current = get_kind(conn, storid)?;
    if !current.is_annotation {
        let conflict = if as_object {
            current.is_data
        } else {
            current.is_object
        };
        if conflict {
            return Err(StoreError::TypeMismatch {
                storid: storid.get(),
            });
        }
    }
    conn.execute(
        "INSERT INTO predicate_kinds (storid, is_object, is_data, is_annotation, is_functional)
         VALUES (?1, ?2, ?3, 0, 0)
         ON CONFLICT(storid) DO UPDATE SET
            is_object = is_object OR excluded.is_object,
            is_data = is_data OR excluded.is_data",
        params![storid.get(), i64::from(as_object), i64::from(!as_object)],
    )?;
    Ok(())
}

pub fn record_object_use(conn: &Connection, storid: Storid) -> StoreResult<()> {
    record_use(conn, storid, true)
}

pub fn record_data_use(conn: &Connection, storid: Storid) -> StoreResult<()> {
    record_use(conn, storid, false)
}

/// Marks a predicate as an annotation property: its object kind is unconstrained, so the
/// normalizer must treat it as ambiguous rather than failing on mixed use.
pub fn mark_annotation(conn: &Connection, storid: Storid) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO predicate_kinds (storid, is_object, is_data, is_annotation, is_functional)
         VALUES (?1, 0, 0, 1, 0)
         ON CONFLICT(storid) DO UPDATE SET is_annotation = 1",
        params![storid.get()],
    )?;
    Ok(())
}

pub fn mark_functional(conn: &Connection, storid: Storid) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO predicate_kinds (storid, is_object, is_data, is_annotation, is_functional)
         VALUES (?1, 0, 0, 0, 1)
         ON CONFLICT(storid) DO UPDATE SET is_functional = 1",
        params![storid.get()],
    )?;
    Ok(())
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
    fn mixing_object_and_data_use_conflicts() {
        let conn = fresh_conn();
        let p = Storid(1000);
        record_object_use(&conn, p).unwrap();
        assert!(matches!(
            record_data_use(&conn, p),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn annotation_properties_may_coexist() {
        let conn = fresh_conn();
        let p = Storid(1001);
        mark_annotation(&conn, p).unwrap();
        record_object_use(&conn, p).unwrap();
        record_data_use(&conn, p).unwrap();
        let kind = get_kind(&conn, p).unwrap();
        assert!(kind.is_annotation && kind.is_object && kind.is_data);
    }
}
