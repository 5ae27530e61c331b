//! Identity registry endpoints, plus the per-agent registration card and
//! trust summary.

use crate::api::{run_blocking, ApiError};
use crate::middleware::Caller;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trustledger_identity::{
    deactivate_agent, get_agent, get_agent_by_domain, register_agent, total_agents,
    update_agent_uri, Agent, RegistrationFile,
};
use trustledger_types::{AgentId, Digest};

/// Request body for agent registration. The caller becomes the owner.
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
    pub domain: String,
    #[serde(rename = "metadataUri", default)]
    pub metadata_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentResponse {
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalResponse {
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DomainLookupResponse {
    pub domain: String,
    /// `0` when no agent holds the domain.
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUriRequest {
    #[serde(rename = "metadataUri")]
    pub metadata_uri: String,
}

/// Optional card extras for `GET /api/agents/{agentId}/registration`.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationQuery {
    /// Comma-separated capability names.
    pub capabilities: Option<String>,
    /// MCP endpoint URL; enables the MCP endpoint when present.
    pub mcp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub registration: RegistrationFile,
    pub digest: Digest,
}

/// Combined reputation and validation standing of an agent.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSummary {
    pub agent_id: AgentId,
    pub reputation_score: u8,
    pub feedback_count: u64,
    pub validation_score: u8,
    pub validation_requests: usize,
}

/// Handler for `POST /api/agents`.
pub async fn register_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(owner): Caller,
    Json(payload): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<RegisterAgentResponse>), ApiError> {
    let agent_id = run_blocking(state, move |conn| {
        Ok(register_agent(
            conn,
            &payload.name,
            &payload.domain,
            &payload.metadata_uri,
            &owner,
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(RegisterAgentResponse { agent_id })))
}

/// Handler for `GET /api/agents/count`.
pub async fn total_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TotalResponse>, ApiError> {
    let total = run_blocking(state, |conn| Ok(total_agents(conn)?)).await?;
    Ok(Json(TotalResponse { total }))
}

/// Handler for `GET /api/agents/{agentId}`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<Agent>, ApiError> {
    let agent = run_blocking(state, move |conn| Ok(get_agent(conn, agent_id)?)).await?;
    Ok(Json(agent))
}

/// Handler for `GET /api/agents/by-domain/{domain}`.
pub async fn get_agent_by_domain_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<DomainLookupResponse>, ApiError> {
    let lookup = domain.clone();
    let agent_id = run_blocking(state, move |conn| Ok(get_agent_by_domain(conn, &lookup)?)).await?;
    Ok(Json(DomainLookupResponse { domain, agent_id }))
}

/// Handler for `PUT /api/agents/{agentId}/uri`.
pub async fn update_agent_uri_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(caller): Caller,
    Path(agent_id): Path<AgentId>,
    Json(payload): Json<UpdateUriRequest>,
) -> Result<Json<Agent>, ApiError> {
    let agent = run_blocking(state, move |conn| {
        update_agent_uri(conn, agent_id, &payload.metadata_uri, &caller)?;
        Ok(get_agent(conn, agent_id)?)
    })
    .await?;
    Ok(Json(agent))
}

/// Handler for `POST /api/agents/{agentId}/deactivate`.
pub async fn deactivate_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(caller): Caller,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<Agent>, ApiError> {
    let agent = run_blocking(state, move |conn| {
        deactivate_agent(conn, agent_id, &caller)?;
        Ok(get_agent(conn, agent_id)?)
    })
    .await?;
    Ok(Json(agent))
}

/// Handler for `GET /api/agents/{agentId}/registration`.
///
/// Returns the `registration-v1` card for the agent together with the
/// digest a publisher would pin it under. `capabilities` and `mcp` query
/// parameters fill in the parts the registry does not store.
pub async fn get_registration_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
    Query(query): Query<RegistrationQuery>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let agent = run_blocking(state, move |conn| Ok(get_agent(conn, agent_id)?)).await?;

    let mut registration = RegistrationFile::for_agent(&agent);
    if let Some(capabilities) = query.capabilities.as_deref() {
        registration = registration.with_capabilities(
            capabilities
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        );
    }
    if let Some(url) = query.mcp.filter(|url| !url.trim().is_empty()) {
        registration = registration.with_mcp_endpoint(url);
    }
    let digest = registration
        .digest()
        .map_err(|e| ApiError::InternalServerError(format!("registration encoding: {}", e)))?;

    Ok(Json(RegistrationResponse {
        registration,
        digest,
    }))
}

/// Handler for `GET /api/agents/{agentId}/trust`.
///
/// The agent id is not checked against the identity registry; unknown
/// agents report zeros.
pub async fn trust_summary_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<TrustSummary>, ApiError> {
    let summary = run_blocking(state, move |conn| read_trust_summary(conn, agent_id)).await?;
    Ok(Json(summary))
}

/// Reads both registries inside one deferred read transaction, so every
/// figure comes from the same committed state.
pub(crate) fn read_trust_summary(
    conn: &mut Connection,
    agent_id: AgentId,
) -> Result<TrustSummary, ApiError> {
    let tx = conn.transaction()?;
    let summary = TrustSummary {
        agent_id,
        reputation_score: trustledger_reputation::get_average_score(&tx, agent_id)?,
        feedback_count: trustledger_reputation::get_feedback_count(&tx, agent_id)?,
        validation_score: trustledger_validation::get_average_validation_score(&tx, agent_id)?,
        validation_requests: trustledger_validation::get_agent_validation_requests(&tx, agent_id)?
            .len(),
    };
    tx.commit()?;
    Ok(summary)
}
