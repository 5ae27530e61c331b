//! Persistence operations for the event log.
//!
//! All writes go through [`emit_event`], which is called by the registries
//! on their open write transaction. Reads go through [`query_events`], which
//! filters by registry, event type and entity with a `seq` cursor.

use rusqlite::{params, Connection};

use crate::error::EventError;
use crate::event::{EventPayload, LedgerEvent, Registry};

/// Number of events returned by [`query_events`] when no limit is given.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Appends one event to the log.
///
/// The sequence number is the table's autoincrement key, so it is assigned
/// by the same transaction that performs the mutation and can never be
/// observed out of order.
///
/// # Errors
///
/// Returns `EventError::Database` on SQL failure or
/// `EventError::Serialization` if the payload cannot be serialised.
pub fn emit_event(conn: &Connection, payload: &EventPayload) -> Result<LedgerEvent, EventError> {
    let payload_json = serde_json::to_string(payload)?;
    let registry = payload.registry();
    let event_type = payload.event_type();
    let entity_id = payload.entity_id();

    let (seq, occurred_at) = conn.query_row(
        "INSERT INTO ledger_events (registry, event_type, entity_id, payload_json)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING seq, occurred_at",
        params![registry.as_str(), event_type, entity_id, payload_json],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;

    tracing::debug!(seq, registry = registry.as_str(), event_type, %entity_id, "event appended");

    Ok(LedgerEvent {
        seq,
        registry: registry.as_str().to_string(),
        event_type: event_type.to_string(),
        entity_id,
        payload_json,
        occurred_at,
    })
}

/// Filter criteria for querying the event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by originating registry.
    pub registry: Option<Registry>,
    /// Filter by event type string.
    pub event_type: Option<String>,
    /// Filter by entity id (agent id or request id).
    pub entity_id: Option<String>,
    /// Only return events with `seq` strictly greater than this cursor.
    pub after_seq: Option<i64>,
    /// Maximum number of events to return (default: [`DEFAULT_QUERY_LIMIT`]).
    pub limit: Option<i64>,
}

/// Queries the event log with optional filters.
///
/// Results are returned in commit order (ascending `seq`). Pass the last
/// `seq` seen as `after_seq` to page forward.
///
/// # Errors
///
/// Returns `EventError::Database` on SQL failure.
pub fn query_events(
    conn: &Connection,
    filter: &EventFilter,
) -> Result<Vec<LedgerEvent>, EventError> {
    // Clauses and bind parameters are collected separately so nothing is
    // interpolated into the SQL text.
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1u32;

    if let Some(registry) = filter.registry {
        clauses.push(format!("registry = ?{idx}"));
        param_values.push(Box::new(registry.as_str().to_string()));
        idx += 1;
    }

    if let Some(ref et) = filter.event_type {
        clauses.push(format!("event_type = ?{idx}"));
        param_values.push(Box::new(et.clone()));
        idx += 1;
    }

    if let Some(ref entity_id) = filter.entity_id {
        clauses.push(format!("entity_id = ?{idx}"));
        param_values.push(Box::new(entity_id.clone()));
        idx += 1;
    }

    if let Some(after) = filter.after_seq {
        clauses.push(format!("seq > ?{idx}"));
        param_values.push(Box::new(after));
        idx += 1;
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT seq, registry, event_type, entity_id, payload_json, occurred_at
         FROM ledger_events
         {where_clause}
         ORDER BY seq ASC
         LIMIT ?{idx}"
    );

    param_values.push(Box::new(filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT)));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(LedgerEvent {
            seq: row.get(0)?,
            registry: row.get(1)?,
            event_type: row.get(2)?,
            entity_id: row.get(3)?,
            payload_json: row.get(4)?,
            occurred_at: row.get(5)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }

    Ok(events)
}
