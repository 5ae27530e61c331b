//! Opening the pooled ledger store.
//!
//! Every pooled connection runs in WAL mode with `synchronous = FULL`, so a
//! registry mutation that has returned survives a crash. A `:memory:` ledger
//! exists only inside the connection that created it; its pool is therefore
//! held to a single connection whatever the settings ask for.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};
use crate::sequence::Sequence;

/// Path that selects a private in-memory ledger.
pub const MEMORY_PATH: &str = ":memory:";

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits for the write lock, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// Pool of connections to one ledger store.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Why the ledger store could not be opened.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool could not be built or handed out no connection.
    #[error("ledger store unavailable: {0}")]
    Unavailable(#[from] r2d2::Error),

    /// The schema could not be brought up to date.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// A counter row is missing or sits below its start value.
    #[error("ledger sequence '{0}' is missing or corrupt")]
    CorruptSequence(&'static str),

    /// Reading the sequence table failed.
    #[error("ledger store check failed: {0}")]
    Database(#[from] rusqlite::Error),
}

fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if !matches!(journal_mode.as_str(), "wal" | "memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("ledger store refused WAL mode (got {journal_mode})")),
        ));
    }
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA synchronous = FULL; PRAGMA foreign_keys = ON;")
}

/// Builds a connection pool over the ledger at `db_path`.
///
/// The schema is not touched; see [`open_ledger`] for the startup path.
///
/// # Errors
///
/// Returns [`PoolError::Unavailable`] if no connection can be opened.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let max_size = if db_path == MEMORY_PATH {
        1
    } else {
        settings.pool_max_size
    };
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    Ok(Pool::builder().max_size(max_size).build(manager)?)
}

/// Confirms every registry counter has its row and has never run backwards.
fn check_sequences(conn: &Connection) -> Result<(), PoolError> {
    for sequence in Sequence::ALL {
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT start_value, next_value FROM ledger_sequences WHERE name = ?1",
                [sequence.name()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((start, next)) if next >= start => {}
            _ => return Err(PoolError::CorruptSequence(sequence.name())),
        }
    }
    Ok(())
}

/// Opens the ledger at `db_path`, applies pending migrations and checks the
/// sequence table before any registry operation runs.
///
/// # Errors
///
/// Returns a [`PoolError`] if the store cannot be opened, migrated, or its
/// counters are damaged.
pub fn open_ledger(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pool = create_pool(db_path, settings)?;
    {
        let conn = pool.get()?;
        let applied = run_migrations(&conn)?;
        check_sequences(&conn)?;
        tracing::info!(
            path = db_path,
            applied_migrations = applied,
            connections = pool.max_size(),
            "ledger store ready"
        );
    }
    Ok(pool)
}
