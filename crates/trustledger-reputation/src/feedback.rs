//! Per-agent append-only feedback lists.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use trustledger_db::{allocate, issued, write_transaction, Sequence};
use trustledger_events::{emit_event, EventPayload};
use trustledger_types::{is_valid_score, storage_key, truncated_mean, Address, AgentId, Digest};

use crate::authorization::is_authorized;
use crate::ReputationError;

/// One feedback entry. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub agent_id: AgentId,
    /// Zero-based position in the agent's list.
    pub index: u64,
    pub reviewer: Address,
    pub score: u8,
    pub tags: Vec<String>,
    pub data_uri: String,
    pub data_hash: Digest,
    pub timestamp: String,
}

const FEEDBACK_COLUMNS: &str =
    "agent_id, feedback_index, reviewer, score, tags_json, data_uri, data_hash, submitted_at";

fn map_row_to_feedback(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    let tags_json: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let hash: Vec<u8> = row.get(6)?;
    let data_hash = Digest::from_slice(&hash)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Blob, Box::new(e)))?;

    Ok(Feedback {
        agent_id: row.get(0)?,
        index: row.get(1)?,
        reviewer: Address::new(row.get::<_, String>(2)?),
        score: row.get(3)?,
        tags,
        data_uri: row.get(5)?,
        data_hash,
        timestamp: row.get(7)?,
    })
}

/// Appends feedback from `reviewer` and returns its index in the agent's list.
///
/// The reviewer must hold a current authorization for the agent. Scores are
/// validated before anything is read, so an out-of-range score never touches
/// the store.
///
/// # Errors
///
/// Returns [`ReputationError::ScoreOutOfRange`] for scores above 100 and
/// [`ReputationError::NotAuthorized`] if the reviewer is not authorized.
pub fn submit_feedback(
    conn: &mut Connection,
    agent_id: AgentId,
    score: u8,
    tags: &[String],
    data_uri: &str,
    data_hash: &Digest,
    reviewer: &Address,
) -> Result<u64, ReputationError> {
    if !is_valid_score(score) {
        return Err(ReputationError::ScoreOutOfRange(score));
    }
    if storage_key(agent_id).is_none() {
        return Err(ReputationError::AgentIdTooLarge(agent_id));
    }
    let tags_json = serde_json::to_string(tags)?;

    let tx = write_transaction(conn)?;

    if !is_authorized(&tx, agent_id, reviewer)? {
        return Err(ReputationError::NotAuthorized {
            agent_id,
            reviewer: reviewer.clone(),
        });
    }

    let index = get_feedback_count(&tx, agent_id)?;
    allocate(&tx, Sequence::Feedback)?;

    tx.execute(
        "INSERT INTO feedback (agent_id, feedback_index, reviewer, score, tags_json, data_uri, data_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            agent_id,
            index,
            reviewer.as_str(),
            score,
            tags_json,
            data_uri,
            data_hash.as_bytes().as_slice(),
        ],
    )?;

    emit_event(
        &tx,
        &EventPayload::FeedbackSubmitted {
            agent_id,
            reviewer: reviewer.clone(),
            score,
            feedback_index: index,
        },
    )?;

    tx.commit()?;

    tracing::info!(agent_id, index, score, reviewer = %reviewer, "feedback submitted");
    Ok(index)
}

/// All feedback for an agent, in submission order.
pub fn get_agent_feedback(
    conn: &Connection,
    agent_id: AgentId,
) -> Result<Vec<Feedback>, ReputationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE agent_id = ?1 ORDER BY feedback_index ASC"
    ))?;
    let rows = stmt.query_map([key], map_row_to_feedback)?;

    let mut feedback = Vec::new();
    for row in rows {
        feedback.push(row?);
    }
    Ok(feedback)
}

/// Length of the agent's feedback list.
pub fn get_feedback_count(conn: &Connection, agent_id: AgentId) -> Result<u64, ReputationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(0);
    };
    let count = conn.query_row(
        "SELECT COUNT(*) FROM feedback WHERE agent_id = ?1",
        [key],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The entry at `index` in the agent's list.
///
/// # Errors
///
/// Returns [`ReputationError::IndexOutOfRange`] if `index >= count`.
pub fn get_feedback(
    conn: &Connection,
    agent_id: AgentId,
    index: u64,
) -> Result<Feedback, ReputationError> {
    let found = match (storage_key(agent_id), storage_key(index)) {
        (Some(agent_key), Some(index_key)) => conn
            .query_row(
                &format!(
                    "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE agent_id = ?1 AND feedback_index = ?2"
                ),
                params![agent_key, index_key],
                map_row_to_feedback,
            )
            .optional()?,
        _ => None,
    };

    match found {
        Some(feedback) => Ok(feedback),
        None => Err(ReputationError::IndexOutOfRange {
            agent_id,
            index,
            count: get_feedback_count(conn, agent_id)?,
        }),
    }
}

/// Truncated integer mean of all feedback scores; `0` with no feedback.
pub fn get_average_score(conn: &Connection, agent_id: AgentId) -> Result<u8, ReputationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(0);
    };
    let (total, count): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(score), 0), COUNT(*) FROM feedback WHERE agent_id = ?1",
        [key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(truncated_mean(total as u64, count as u64))
}

/// Number of feedback entries stored across all agents.
pub fn total_feedback(conn: &Connection) -> Result<u64, ReputationError> {
    Ok(issued(conn, Sequence::Feedback)?)
}
