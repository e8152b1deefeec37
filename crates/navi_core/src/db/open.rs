//! Connection bootstrap for the document database.
//!
//! # Invariants
//! - Returned connections have migrations fully applied.
//! - Every open attempt emits exactly one terminal `db_open` event.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    File,
    Memory,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (or creates) a document database file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_logged(Mode::File, || {
        Connection::open(path.as_ref()).map_err(DbError::from)
    })
}

/// Opens a private in-memory document database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_logged(Mode::Memory, || {
        Connection::open_in_memory().map_err(DbError::from)
    })
}

fn open_logged(mode: Mode, connect: impl FnOnce() -> DbResult<Connection>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect().and_then(|mut conn| {
        prepare(&mut conn, mode)?;
        Ok(conn)
    });
    let elapsed_ms = started_at.elapsed().as_millis();

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={elapsed_ms}",
            mode.as_str()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={elapsed_ms} error={err}",
            mode.as_str()
        ),
    }
    result
}

fn prepare(conn: &mut Connection, mode: Mode) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if mode == Mode::File {
        // Readers keep working while a write is committing.
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    apply_migrations(conn)
}
