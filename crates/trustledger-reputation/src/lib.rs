//! Reputation Registry for the TrustLedger platform.
//!
//! Holds two things per agent:
//!
//! - the **authorization relation** `(agent_id, client) -> authorized`,
//!   which gates who may review the agent, and
//! - the append-only **feedback list**, whose scores roll up into the
//!   agent's reputation (a truncated integer mean).
//!
//! Agent ids are opaque here: the registry never checks that an agent
//! exists in the identity tables, so it can be deployed on its own.
//! Authorizing a client is permissionless; whoever issues the authorization
//! is recorded on the `FEEDBACK_AUTHORIZED` event.

mod authorization;
mod feedback;

use thiserror::Error;
use trustledger_types::{Address, AgentId, ErrorKind};

pub use authorization::{
    authorize_feedback, get_authorization, is_authorized, revoke_feedback_authorization,
    FeedbackAuthorization,
};
pub use feedback::{
    get_agent_feedback, get_average_score, get_feedback, get_feedback_count, submit_feedback,
    total_feedback, Feedback,
};

/// Errors produced by reputation registry operations.
#[derive(Debug, Error)]
pub enum ReputationError {
    /// The client to authorize is the null identity.
    #[error("client address cannot be null")]
    NullClient,

    /// The agent id lies beyond what the store can key.
    #[error("agent id {0} is out of the storable range")]
    AgentIdTooLarge(AgentId),

    /// Scores must lie in `0..=100`.
    #[error("score {0} exceeds the maximum of 100")]
    ScoreOutOfRange(u8),

    /// The client is already authorized for this agent.
    #[error("client {client} is already authorized for agent {agent_id}")]
    AlreadyAuthorized { agent_id: AgentId, client: Address },

    /// The reviewer holds no current authorization for this agent.
    #[error("reviewer {reviewer} is not authorized to review agent {agent_id}")]
    NotAuthorized { agent_id: AgentId, reviewer: Address },

    /// Revocation of a pair that is not currently authorized.
    #[error("client {client} is not currently authorized for agent {agent_id}")]
    NotCurrentlyAuthorized { agent_id: AgentId, client: Address },

    /// Feedback index past the end of the agent's list.
    #[error("feedback index {index} out of range for agent {agent_id} ({count} entries)")]
    IndexOutOfRange {
        agent_id: AgentId,
        index: u64,
        count: u64,
    },

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Tags could not be encoded.
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The domain event could not be recorded.
    #[error("event log error: {0}")]
    Event(#[from] trustledger_events::EventError),
}

impl ReputationError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NullClient | Self::AgentIdTooLarge(_) | Self::ScoreOutOfRange(_) => {
                ErrorKind::InvalidArgument
            }
            Self::AlreadyAuthorized { .. } => ErrorKind::AlreadyExists,
            Self::NotAuthorized { .. } => ErrorKind::Unauthorized,
            Self::NotCurrentlyAuthorized { .. } => ErrorKind::InvalidState,
            Self::IndexOutOfRange { .. } => ErrorKind::OutOfRange,
            Self::Database(_) | Self::Json(_) | Self::Event(_) => ErrorKind::Storage,
        }
    }
}
