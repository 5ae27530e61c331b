use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use trustledger_db::{allocate, issued, write_transaction, Sequence};
use trustledger_events::{emit_event, EventPayload};
use trustledger_types::{
    is_valid_score, storage_key, truncated_mean, Address, AgentId, Digest, RequestId,
};

use crate::ValidationError;

/// Lifecycle state of a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Open,
    Completed,
}

/// A request for a validator to score an agent's work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub request_id: RequestId,
    /// The agent whose work is validated.
    pub agent_id: AgentId,
    pub requester: Address,
    pub validator_id: AgentId,
    pub request_uri: String,
    pub request_hash: Digest,
    pub timestamp: String,
    pub completed: bool,
}

impl ValidationRequest {
    pub fn status(&self) -> ValidationStatus {
        if self.completed {
            ValidationStatus::Completed
        } else {
            ValidationStatus::Open
        }
    }
}

/// The validator's answer. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub request_id: RequestId,
    /// Copied from the request.
    pub validator_id: AgentId,
    pub score: u8,
    pub response_uri: String,
    pub response_hash: Digest,
    pub timestamp: String,
}

fn digest_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Digest> {
    let bytes: Vec<u8> = row.get(idx)?;
    Digest::from_slice(&bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

fn map_row_to_request(row: &Row<'_>) -> rusqlite::Result<ValidationRequest> {
    Ok(ValidationRequest {
        request_id: row.get(0)?,
        agent_id: row.get(1)?,
        requester: Address::new(row.get::<_, String>(2)?),
        validator_id: row.get(3)?,
        request_uri: row.get(4)?,
        request_hash: digest_column(row, 5)?,
        timestamp: row.get(6)?,
        completed: row.get(7)?,
    })
}

fn map_row_to_response(row: &Row<'_>) -> rusqlite::Result<ValidationResponse> {
    Ok(ValidationResponse {
        request_id: row.get(0)?,
        validator_id: row.get(1)?,
        score: row.get(2)?,
        response_uri: row.get(3)?,
        response_hash: digest_column(row, 4)?,
        timestamp: row.get(5)?,
    })
}

/// Opens a validation request and returns its id.
///
/// The request is stored `Open` and appended to both the agent's and the
/// validator's request lists.
///
/// # Errors
///
/// Returns [`ValidationError::ZeroAgentId`], [`ValidationError::ZeroValidatorId`]
/// or [`ValidationError::EmptyRequestUri`] for malformed input.
pub fn request_validation(
    conn: &mut Connection,
    agent_id: AgentId,
    validator_id: AgentId,
    request_uri: &str,
    request_hash: &Digest,
    requester: &Address,
) -> Result<RequestId, ValidationError> {
    if agent_id == 0 {
        return Err(ValidationError::ZeroAgentId);
    }
    if validator_id == 0 {
        return Err(ValidationError::ZeroValidatorId);
    }
    if storage_key(agent_id).is_none() {
        return Err(ValidationError::IdTooLarge {
            field: "agent",
            id: agent_id,
        });
    }
    if storage_key(validator_id).is_none() {
        return Err(ValidationError::IdTooLarge {
            field: "validator",
            id: validator_id,
        });
    }
    if request_uri.is_empty() {
        return Err(ValidationError::EmptyRequestUri);
    }

    let tx = write_transaction(conn)?;

    let request_id = allocate(&tx, Sequence::ValidationRequestId)?;

    tx.execute(
        "INSERT INTO validation_requests
            (request_id, agent_id, requester, validator_id, request_uri, request_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            request_id,
            agent_id,
            requester.as_str(),
            validator_id,
            request_uri,
            request_hash.as_bytes().as_slice(),
        ],
    )?;

    tx.execute(
        "INSERT INTO agent_validation_index (agent_id, position, request_id)
         SELECT ?1, COUNT(*), ?2 FROM agent_validation_index WHERE agent_id = ?1",
        params![agent_id, request_id],
    )?;
    tx.execute(
        "INSERT INTO validator_request_index (validator_id, position, request_id)
         SELECT ?1, COUNT(*), ?2 FROM validator_request_index WHERE validator_id = ?1",
        params![validator_id, request_id],
    )?;

    emit_event(
        &tx,
        &EventPayload::ValidationRequested {
            request_id,
            agent_id,
            validator_id,
            requester: requester.clone(),
            request_uri: request_uri.to_string(),
        },
    )?;

    tx.commit()?;

    tracing::info!(request_id, agent_id, validator_id, "validation requested");
    Ok(request_id)
}

/// Records the validator's response and completes the request.
///
/// Checks run in the order: request exists, score in range, request still
/// open.
///
/// # Errors
///
/// Returns [`ValidationError::RequestNotFound`] for an unissued id,
/// [`ValidationError::ScoreOutOfRange`] for scores above 100, and
/// [`ValidationError::AlreadyCompleted`] if a response already exists.
pub fn submit_validation_response(
    conn: &mut Connection,
    request_id: RequestId,
    score: u8,
    response_uri: &str,
    response_hash: &Digest,
) -> Result<(), ValidationError> {
    let tx = write_transaction(conn)?;

    let request = get_validation_request(&tx, request_id)?;
    if !is_valid_score(score) {
        return Err(ValidationError::ScoreOutOfRange(score));
    }
    if request.completed {
        return Err(ValidationError::AlreadyCompleted(request_id));
    }

    tx.execute(
        "INSERT INTO validation_responses
            (request_id, validator_id, score, response_uri, response_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            request_id,
            request.validator_id,
            score,
            response_uri,
            response_hash.as_bytes().as_slice(),
        ],
    )?;
    tx.execute(
        "UPDATE validation_requests SET completed = 1 WHERE request_id = ?1",
        [request_id],
    )?;

    emit_event(
        &tx,
        &EventPayload::ValidationResponseSubmitted {
            request_id,
            agent_id: request.agent_id,
            validator_id: request.validator_id,
            score,
        },
    )?;

    tx.commit()?;

    tracing::info!(
        request_id,
        agent_id = request.agent_id,
        validator_id = request.validator_id,
        score,
        "validation completed"
    );
    Ok(())
}

/// Fetches a request by id.
pub fn get_validation_request(
    conn: &Connection,
    request_id: RequestId,
) -> Result<ValidationRequest, ValidationError> {
    let key = storage_key(request_id).ok_or(ValidationError::RequestNotFound(request_id))?;
    conn.query_row(
        "SELECT request_id, agent_id, requester, validator_id, request_uri, request_hash,
                requested_at, completed
         FROM validation_requests WHERE request_id = ?1",
        [key],
        map_row_to_request,
    )
    .optional()?
    .ok_or(ValidationError::RequestNotFound(request_id))
}

/// Fetches the response for a completed request.
///
/// # Errors
///
/// Returns [`ValidationError::RequestNotFound`] for an unissued id and
/// [`ValidationError::NotCompleted`] while the request is still open.
pub fn get_validation_response(
    conn: &Connection,
    request_id: RequestId,
) -> Result<ValidationResponse, ValidationError> {
    let request = get_validation_request(conn, request_id)?;
    if !request.completed {
        return Err(ValidationError::NotCompleted(request_id));
    }

    let response = conn.query_row(
        "SELECT request_id, validator_id, score, response_uri, response_hash, responded_at
         FROM validation_responses WHERE request_id = ?1",
        [request_id],
        map_row_to_response,
    )?;
    Ok(response)
}

/// Whether the request has been answered.
pub fn is_validation_completed(
    conn: &Connection,
    request_id: RequestId,
) -> Result<bool, ValidationError> {
    Ok(get_validation_request(conn, request_id)?.completed)
}

/// Request ids opened for `agent_id`, in creation order. Empty when none.
pub fn get_agent_validation_requests(
    conn: &Connection,
    agent_id: AgentId,
) -> Result<Vec<RequestId>, ValidationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare(
        "SELECT request_id FROM agent_validation_index WHERE agent_id = ?1 ORDER BY position ASC",
    )?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<Result<Vec<RequestId>, _>>()?;
    Ok(ids)
}

/// Request ids assigned to `validator_id`, in creation order. Empty when none.
pub fn get_validator_requests(
    conn: &Connection,
    validator_id: AgentId,
) -> Result<Vec<RequestId>, ValidationError> {
    let Some(key) = storage_key(validator_id) else {
        return Ok(Vec::new());
    };
    let mut stmt = conn.prepare(
        "SELECT request_id FROM validator_request_index WHERE validator_id = ?1 ORDER BY position ASC",
    )?;
    let ids = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<Result<Vec<RequestId>, _>>()?;
    Ok(ids)
}

/// Truncated integer mean of response scores over the agent's completed
/// requests. Open requests do not count; `0` when nothing is completed.
pub fn get_average_validation_score(
    conn: &Connection,
    agent_id: AgentId,
) -> Result<u8, ValidationError> {
    let Some(key) = storage_key(agent_id) else {
        return Ok(0);
    };
    let (total, count): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(resp.score), 0), COUNT(resp.request_id)
         FROM agent_validation_index idx
         JOIN validation_requests req ON req.request_id = idx.request_id
         JOIN validation_responses resp ON resp.request_id = idx.request_id
         WHERE idx.agent_id = ?1 AND req.completed = 1",
        [key],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(truncated_mean(total as u64, count as u64))
}

/// Number of request ids issued so far.
pub fn total_validation_requests(conn: &Connection) -> Result<u64, ValidationError> {
    Ok(issued(conn, Sequence::ValidationRequestId)?)
}
