//! Validation Registry for the TrustLedger platform.
//!
//! A validation is a two-phase exchange: a requester asks a validator agent
//! to score a piece of another agent's work, and the validator answers once.
//!
//! ```text
//! Open ──submit_validation_response──▶ Completed
//! ```
//!
//! `Completed` is terminal. Request ids come from one store-wide sequence
//! starting at 0, so they are globally unique and increase across all
//! agents. Each request is also appended to two derived indexes (agent to
//! owned requests, validator to assigned requests) in the same transaction
//! as the request itself.

mod registry;

use thiserror::Error;
use trustledger_types::{AgentId, ErrorKind, RequestId};

pub use registry::{
    get_agent_validation_requests, get_average_validation_score, get_validation_request,
    get_validation_response, get_validator_requests, is_validation_completed,
    request_validation, submit_validation_response, total_validation_requests,
    ValidationRequest, ValidationResponse, ValidationStatus,
};

/// Errors produced by validation registry operations.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The subject agent id was zero.
    #[error("agent id must be non-zero")]
    ZeroAgentId,

    /// The validator id was zero.
    #[error("validator id must be non-zero")]
    ZeroValidatorId,

    /// The agent or validator id lies beyond what the store can key.
    #[error("{field} id {id} is out of the storable range")]
    IdTooLarge { field: &'static str, id: AgentId },

    /// The request URI was empty.
    #[error("request uri cannot be empty")]
    EmptyRequestUri,

    /// Scores must lie in `0..=100`.
    #[error("score {0} exceeds the maximum of 100")]
    ScoreOutOfRange(u8),

    /// No request was ever issued under this id.
    #[error("validation request {0} not found")]
    RequestNotFound(RequestId),

    /// The request already has its response.
    #[error("validation request {0} is already completed")]
    AlreadyCompleted(RequestId),

    /// The request is still waiting for its response.
    #[error("validation request {0} has no response yet")]
    NotCompleted(RequestId),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The domain event could not be recorded.
    #[error("event log error: {0}")]
    Event(#[from] trustledger_events::EventError),
}

impl ValidationError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAgentId
            | Self::ZeroValidatorId
            | Self::IdTooLarge { .. }
            | Self::EmptyRequestUri
            | Self::ScoreOutOfRange(_) => ErrorKind::InvalidArgument,
            Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyCompleted(_) | Self::NotCompleted(_) => ErrorKind::InvalidState,
            Self::Database(_) | Self::Event(_) => ErrorKind::Storage,
        }
    }
}
