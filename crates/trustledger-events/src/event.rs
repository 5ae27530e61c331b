//! Registry, payload, and record types for the event log.

use serde::{Deserialize, Serialize};
use trustledger_types::{Address, AgentId, RequestId};

/// The registry an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Registry {
    /// Agent registration and lifecycle.
    #[serde(rename = "IDENTITY")]
    Identity,
    /// Feedback authorization and submission.
    #[serde(rename = "REPUTATION")]
    Reputation,
    /// Validation requests and responses.
    #[serde(rename = "VALIDATION")]
    Validation,
}

impl Registry {
    /// Returns the canonical string label for this registry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "IDENTITY",
            Self::Reputation => "REPUTATION",
            Self::Validation => "VALIDATION",
        }
    }
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Registry {
    type Err = ParseRegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDENTITY" => Ok(Self::Identity),
            "REPUTATION" => Ok(Self::Reputation),
            "VALIDATION" => Ok(Self::Validation),
            _ => Err(ParseRegistryError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown registry label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown registry: {0}")]
pub struct ParseRegistryError(pub String);

/// Structured event payloads, one variant per event type.
///
/// Payloads are serialised to JSON and stored in the `payload_json` column
/// of `ledger_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // ── Identity ─────────────────────────────────────────────────────
    /// A new agent was registered.
    AgentRegistered {
        agent_id: AgentId,
        name: String,
        domain: String,
        owner: Address,
    },

    /// An agent's metadata URI was replaced by its owner.
    AgentUpdated {
        agent_id: AgentId,
        metadata_uri: String,
    },

    /// An agent was permanently deactivated.
    AgentDeactivated { agent_id: AgentId },

    // ── Reputation ───────────────────────────────────────────────────
    /// A client was authorized to submit feedback for an agent.
    FeedbackAuthorized {
        agent_id: AgentId,
        client: Address,
        /// Whoever issued the authorization. Not checked against ownership.
        authorized_by: Address,
    },

    /// Feedback was appended for an agent.
    FeedbackSubmitted {
        agent_id: AgentId,
        reviewer: Address,
        score: u8,
        /// Zero-based position in the agent's feedback list.
        feedback_index: u64,
    },

    /// A client's feedback authorization was revoked.
    FeedbackRevoked {
        agent_id: AgentId,
        client: Address,
        revoked_by: Address,
    },

    // ── Validation ───────────────────────────────────────────────────
    /// A validation request was opened.
    ValidationRequested {
        request_id: RequestId,
        agent_id: AgentId,
        validator_id: AgentId,
        requester: Address,
        request_uri: String,
    },

    /// A validator answered a request, completing it.
    ValidationResponseSubmitted {
        request_id: RequestId,
        agent_id: AgentId,
        validator_id: AgentId,
        score: u8,
    },
}

impl EventPayload {
    /// Returns the canonical event type string for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AgentRegistered { .. } => "AGENT_REGISTERED",
            Self::AgentUpdated { .. } => "AGENT_UPDATED",
            Self::AgentDeactivated { .. } => "AGENT_DEACTIVATED",
            Self::FeedbackAuthorized { .. } => "FEEDBACK_AUTHORIZED",
            Self::FeedbackSubmitted { .. } => "FEEDBACK_SUBMITTED",
            Self::FeedbackRevoked { .. } => "FEEDBACK_REVOKED",
            Self::ValidationRequested { .. } => "VALIDATION_REQUESTED",
            Self::ValidationResponseSubmitted { .. } => "VALIDATION_RESPONSE_SUBMITTED",
        }
    }

    /// Returns the registry this payload belongs to.
    pub fn registry(&self) -> Registry {
        match self {
            Self::AgentRegistered { .. }
            | Self::AgentUpdated { .. }
            | Self::AgentDeactivated { .. } => Registry::Identity,
            Self::FeedbackAuthorized { .. }
            | Self::FeedbackSubmitted { .. }
            | Self::FeedbackRevoked { .. } => Registry::Reputation,
            Self::ValidationRequested { .. } | Self::ValidationResponseSubmitted { .. } => {
                Registry::Validation
            }
        }
    }

    /// Returns the id the event is filed under: the agent id for identity
    /// and reputation events, the request id for validation events.
    pub fn entity_id(&self) -> String {
        match self {
            Self::AgentRegistered { agent_id, .. }
            | Self::AgentUpdated { agent_id, .. }
            | Self::AgentDeactivated { agent_id }
            | Self::FeedbackAuthorized { agent_id, .. }
            | Self::FeedbackSubmitted { agent_id, .. }
            | Self::FeedbackRevoked { agent_id, .. } => agent_id.to_string(),
            Self::ValidationRequested { request_id, .. }
            | Self::ValidationResponseSubmitted { request_id, .. } => request_id.to_string(),
        }
    }
}

/// A single row from the `ledger_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Global, strictly increasing sequence number.
    pub seq: i64,
    /// The originating registry (`IDENTITY`, `REPUTATION`, `VALIDATION`).
    pub registry: String,
    /// The event type (e.g. `AGENT_REGISTERED`).
    pub event_type: String,
    /// Agent id or request id, see [`EventPayload::entity_id`].
    pub entity_id: String,
    /// The structured payload as a JSON string.
    pub payload_json: String,
    /// ISO 8601 timestamp of the commit.
    pub occurred_at: String,
}

impl LedgerEvent {
    /// Decodes the stored payload.
    pub fn payload(&self) -> Result<EventPayload, serde_json::Error> {
        serde_json::from_str(&self.payload_json)
    }
}
