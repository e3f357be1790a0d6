//! The on-disk relational schema (spec.md §6 "Storage file").

pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ontologies (
    graph_id    INTEGER PRIMARY KEY,
    iri         TEXT UNIQUE NOT NULL,
    last_update INTEGER NOT NULL DEFAULT 0,
    dirty       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS resources (
    storid INTEGER PRIMARY KEY,
    iri    TEXT UNIQUE NOT NULL,
    refs   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS lang_tags (
    tag_id INTEGER PRIMARY KEY,
    tag    TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS objs (
    graph INTEGER NOT NULL,
    s     INTEGER NOT NULL,
    p     INTEGER NOT NULL,
    o     INTEGER NOT NULL,
    PRIMARY KEY (graph, s, p, o)
);
CREATE INDEX IF NOT EXISTS objs_sp ON objs (s, p);
CREATE INDEX IF NOT EXISTS objs_po ON objs (p, o);
CREATE INDEX IF NOT EXISTS objs_op ON objs (o, p);
CREATE INDEX IF NOT EXISTS objs_graph_s ON objs (graph, s);

CREATE TABLE IF NOT EXISTS datas (
    graph INTEGER NOT NULL,
    s     INTEGER NOT NULL,
    p     INTEGER NOT NULL,
    value NOT NULL,
    dtype INTEGER NOT NULL,
    PRIMARY KEY (graph, s, p, value, dtype)
);
CREATE INDEX IF NOT EXISTS datas_sp ON datas (s, p);
CREATE INDEX IF NOT EXISTS datas_pvalue ON datas (p, value);
CREATE INDEX IF NOT EXISTS datas_graph_s ON datas (graph, s);

CREATE TABLE IF NOT EXISTS predicate_kinds (
    storid         INTEGER PRIMARY KEY,
    is_object      INTEGER NOT NULL DEFAULT 0,
    is_data        INTEGER NOT NULL DEFAULT 0,
    is_annotation  INTEGER NOT NULL DEFAULT 0,
    is_functional  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS prop_fts (
    predicate_storid INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

#[cfg(test)]
mod tests {
    use super::CREATE_SCHEMA;
    use rusqlite::Connection;

    #[test]
    fn schema_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        // Applying twice must stay idempotent (IF NOT EXISTS everywhere).
        conn.execute_batch(CREATE_SCHEMA).unwrap();
    }
}
