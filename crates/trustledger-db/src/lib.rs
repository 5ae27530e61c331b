//! Ledger store for the TrustLedger registries.
//!
//! Provides the [`open_ledger`] startup routine over an `r2d2` pool of
//! durable WAL connections, embedded SQL migrations, the serialized write
//! transaction every mutating registry operation runs in, and the shared
//! sequence counters used for id allocation.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: readers see a consistent snapshot while a
//!   single writer commits. Any store that offers the same per-operation
//!   atomicity could sit behind the registries.
//! - **`BEGIN IMMEDIATE` for writes**: the write lock is taken before the
//!   first precondition read, so two conflicting operations are strictly
//!   ordered and the second one observes the first one's result.
//! - **Sequences in the store**: agent ids, request ids, and the feedback
//!   counter live in `ledger_sequences`, never in process memory, so every
//!   connection and every registry instance shares one linearizable counter.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that depends on it.

mod migrations;
mod pool;
mod sequence;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_ledger, DbPool, DbRuntimeSettings, PoolError, MEMORY_PATH};
pub use sequence::{allocate, issued, write_transaction, Sequence};
