//! Agent registration documents.
//!
//! The registry stores only an opaque `metadata_uri`. The document behind
//! that URI is the agent card built here: who the agent is, where it can be
//! reached, and which trust models it participates in. Publishing it is the
//! caller's job; [`RegistrationFile::digest`] gives the hash to pin it with.

use serde::{Deserialize, Serialize};
use trustledger_types::{AgentId, Digest};

use crate::Agent;

/// Version tag written into every registration document.
pub const REGISTRATION_VERSION: &str = "registration-v1";

/// A single protocol endpoint advertised by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub enabled: bool,
    pub endpoint: String,
}

impl Endpoint {
    fn disabled() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
        }
    }
}

/// Agent-to-agent and MCP endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub a2a: Endpoint,
    pub mcp: Endpoint,
}

/// The `registration-v1` agent card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFile {
    pub version: String,
    pub agent_id: AgentId,
    pub name: String,
    pub description: String,
    pub wallet: String,
    pub domain: String,
    pub endpoints: Endpoints,
    pub capabilities: Vec<String>,
    pub trust_models: Vec<String>,
}

impl RegistrationFile {
    /// Builds the default card for a registered agent: A2A served from the
    /// agent's domain, MCP disabled, both trust models enabled.
    pub fn for_agent(agent: &Agent) -> Self {
        Self {
            version: REGISTRATION_VERSION.to_string(),
            agent_id: agent.id,
            name: agent.name.clone(),
            description: format!("{} - trust-ledger registered agent", agent.name),
            wallet: agent.owner.to_string(),
            domain: agent.domain.clone(),
            endpoints: Endpoints {
                a2a: Endpoint {
                    enabled: true,
                    endpoint: format!("https://{}/a2a", agent.domain),
                },
                mcp: Endpoint::disabled(),
            },
            capabilities: Vec::new(),
            trust_models: vec!["reputation".to_string(), "validation".to_string()],
        }
    }

    /// Replaces the advertised capabilities.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Enables the MCP endpoint at `url`.
    pub fn with_mcp_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.mcp = Endpoint {
            enabled: true,
            endpoint: url.into(),
        };
        self
    }

    /// Content digest of the canonical JSON encoding of this document.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the document cannot be encoded.
    pub fn digest(&self) -> Result<Digest, serde_json::Error> {
        Ok(Digest::of_json(&serde_json::to_value(self)?))
    }
}
