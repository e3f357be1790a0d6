//! A small hand-rolled pool of read-only connections (SPEC_FULL.md §5: "each owning its own
//! read-only connection drawn from a pooled set ... matching the teacher's own hand-rolled
//! `ConnectionPool` ... rather than reaching for an external pooling crate").

use crate::config::Storage;
use quadstore_store::{StoreError, StoreResult};
use rusqlite::{Connection, OpenFlags};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Where every connection this pool opens should point, resolved once at `Store::open` time (a
/// shared-cache URI for `Storage::Memory`, so every pooled connection sees the same database).
#[derive(Debug, Clone)]
pub(crate) enum Target {
    File(std::path::PathBuf),
    MemoryUri(String),
}

impl Target {
    pub(crate) fn resolve(storage: &Storage) -> Self {
        match storage {
            Storage::File(path) => Self::File(path.clone()),
            Storage::Memory => Self::MemoryUri(format!("file:quadstore-{:x}?mode=memory&cache=shared", rand::random::<u64>())),
        }
    }

    pub(crate) fn open(&self, busy_timeout: Duration) -> StoreResult<Connection> {
        let conn = match self {
            Self::File(path) => Connection::open(path)?,
            Self::MemoryUri(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        conn.busy_timeout(busy_timeout)?;
        quadstore_compiler::functions::register(&conn)?;
        Ok(conn)
    }
}

pub(crate) struct ReadPool {
    target: Target,
    busy_timeout: Duration,
    max: usize,
    idle: Mutex<Vec<Connection>>,
    outstanding: Mutex<usize>,
    became_available: Condvar,
}

impl ReadPool {
    pub(crate) fn new(target: Target, max: usize, busy_timeout: Duration) -> Self {
        Self {
            target,
            busy_timeout,
            max,
            idle: Mutex::new(Vec::new()),
            outstanding: Mutex::new(0),
            became_available: Condvar::new(),
        }
    }

    pub(crate) fn checkout(&self) -> StoreResult<PooledConnection<'_>> {
        if let Some(conn) = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop() {
            return Ok(PooledConnection { pool: self, conn: Some(conn) });
        }
        let mut outstanding = self.outstanding.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *outstanding < self.max {
                *outstanding += 1;
                drop(outstanding);
                return match self.target.open(self.busy_timeout) {
                    Ok(conn) => Ok(PooledConnection { pool: self, conn: Some(conn) }),
                    Err(e) => {
                        *self.outstanding.lock().unwrap_or_else(|e| e.into_inner()) -= 1;
                        Err(StoreError::from(e))
                    }
                };
            }
            if let Some(conn) = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop() {
                return Ok(PooledConnection { pool: self, conn: Some(conn) });
            }
            outstanding = self
                .became_available
                .wait(outstanding)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn release(&self, conn: Connection) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).push(conn);
        self.became_available.notify_one();
    }
}

/// A checked-out read connection; returned to the pool automatically on drop.
pub(crate) struct PooledConnection<'a> {
    pool: &'a ReadPool,
    conn: Option<Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
