//! Identity Registry for the TrustLedger platform.
//!
//! Assigns agents durable, sequential identifiers, enforces that every
//! domain maps to at most one agent, and exposes the activation lifecycle:
//! an agent is created active, its metadata URI may be replaced by its owner
//! while it stays active, and it can be deactivated exactly once.
//!
//! All mutations run inside a single `BEGIN IMMEDIATE` transaction obtained
//! from [`trustledger_db::write_transaction`] and append their domain event
//! before committing.

pub mod registration;
mod registry;

use thiserror::Error;
use trustledger_types::{Address, AgentId, ErrorKind};

pub use registration::{Endpoint, Endpoints, RegistrationFile, REGISTRATION_VERSION};
pub use registry::{
    deactivate_agent, get_agent, get_agent_by_domain, register_agent, total_agents,
    update_agent_uri, Agent,
};

/// Errors produced by identity registry operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The agent name was empty.
    #[error("agent name cannot be empty")]
    EmptyName,

    /// The agent domain was empty.
    #[error("agent domain cannot be empty")]
    EmptyDomain,

    /// Another agent already holds the domain.
    #[error("domain '{0}' is already registered")]
    DomainTaken(String),

    /// No agent was ever registered under this id.
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    /// The caller is not the agent's owner.
    #[error("caller {caller} does not own agent {agent_id}")]
    NotOwner {
        /// The agent being modified.
        agent_id: AgentId,
        /// The rejected caller.
        caller: Address,
    },

    /// The agent has been deactivated.
    #[error("agent {0} is inactive")]
    AgentInactive(AgentId),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The domain event could not be recorded.
    #[error("event log error: {0}")]
    Event(#[from] trustledger_events::EventError),
}

impl IdentityError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyName | Self::EmptyDomain => ErrorKind::InvalidArgument,
            Self::DomainTaken(_) => ErrorKind::AlreadyExists,
            Self::AgentNotFound(_) => ErrorKind::NotFound,
            Self::NotOwner { .. } => ErrorKind::Unauthorized,
            Self::AgentInactive(_) => ErrorKind::InvalidState,
            Self::Database(_) | Self::Event(_) => ErrorKind::Storage,
        }
    }
}
