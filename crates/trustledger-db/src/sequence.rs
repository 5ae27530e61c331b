//! Write transactions and shared sequence counters.
//!
//! Every mutating registry operation calls [`write_transaction`] first and
//! performs all of its reads, writes, sequence allocations and event appends
//! on the returned transaction. Dropping the transaction without committing
//! rolls every write back.

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// The counters kept in `ledger_sequences`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    /// Agent ids, starting at 1.
    AgentId,
    /// Validation request ids, starting at 0 and shared by all agents.
    ValidationRequestId,
    /// Global count of submitted feedback entries.
    Feedback,
}

impl Sequence {
    /// Every counter the registries rely on.
    pub const ALL: [Sequence; 3] = [
        Sequence::AgentId,
        Sequence::ValidationRequestId,
        Sequence::Feedback,
    ];

    /// Row name in `ledger_sequences`.
    pub fn name(self) -> &'static str {
        match self {
            Self::AgentId => "agent_id",
            Self::ValidationRequestId => "validation_request_id",
            Self::Feedback => "feedback",
        }
    }
}

/// Opens a write transaction holding the database write lock from the start.
///
/// Conflicting writers block (up to the connection's busy timeout) instead of
/// interleaving, which gives every key a strict total order of mutations.
///
/// # Errors
///
/// Returns the SQLite error if the lock cannot be acquired.
pub fn write_transaction(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Claims the next value of `sequence`.
///
/// Must be called inside a [`write_transaction`]; the value only becomes
/// visible to other writers once that transaction commits.
///
/// # Errors
///
/// Returns the SQLite error on failure, including `QueryReturnedNoRows` if
/// the sequence row is missing (migrations not applied).
pub fn allocate(conn: &Connection, sequence: Sequence) -> rusqlite::Result<u64> {
    conn.query_row(
        "UPDATE ledger_sequences SET next_value = next_value + 1
         WHERE name = ?1
         RETURNING next_value - 1",
        [sequence.name()],
        |row| row.get(0),
    )
}

/// Number of values handed out by `sequence` so far.
///
/// # Errors
///
/// Returns the SQLite error on failure.
pub fn issued(conn: &Connection, sequence: Sequence) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT next_value - start_value FROM ledger_sequences WHERE name = ?1",
        [sequence.name()],
        |row| row.get(0),
    )
}
