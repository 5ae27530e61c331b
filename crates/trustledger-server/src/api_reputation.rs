//! Reputation registry endpoints.

use crate::api::{resolve_digest, run_blocking, score_from, ApiError};
use crate::api_identity::TotalResponse;
use crate::middleware::Caller;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use trustledger_reputation::{
    authorize_feedback, get_agent_feedback, get_authorization, get_average_score, get_feedback,
    get_feedback_count, revoke_feedback_authorization, submit_feedback, total_feedback, Feedback,
};
use trustledger_types::{Address, AgentId};

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub client: String,
}

/// Current authorization state of a `(agent, client)` pair.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    pub agent_id: AgentId,
    pub client: Address,
    pub authorized: bool,
    /// Last time the pair was authorized, if ever.
    pub authorized_at: Option<String>,
}

/// Request body for feedback submission. The caller is the reviewer.
///
/// The data hash may be given directly (`dataHash`, 64 hex chars) or
/// derived from a JSON document (`data`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedbackRequest {
    pub score: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub data_uri: String,
    pub data_hash: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitFeedbackResponse {
    pub index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackListResponse {
    pub feedback: Vec<Feedback>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationResponse {
    pub agent_id: AgentId,
    pub average_score: u8,
    pub feedback_count: u64,
}

fn authorization_state(
    conn: &rusqlite::Connection,
    agent_id: AgentId,
    client: Address,
) -> Result<AuthorizationResponse, ApiError> {
    let stored = get_authorization(conn, agent_id, &client)?;
    Ok(AuthorizationResponse {
        agent_id,
        authorized: stored.as_ref().is_some_and(|a| a.authorized),
        authorized_at: stored.map(|a| a.authorized_at),
        client,
    })
}

/// Handler for `POST /api/agents/{agentId}/feedback/authorizations`.
///
/// Any authenticated caller may authorize any client.
pub async fn authorize_feedback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(caller): Caller,
    Path(agent_id): Path<AgentId>,
    Json(payload): Json<AuthorizeRequest>,
) -> Result<(StatusCode, Json<AuthorizationResponse>), ApiError> {
    let client = Address::new(&payload.client);
    let response = run_blocking(state, move |conn| {
        authorize_feedback(conn, agent_id, &client, &caller)?;
        authorization_state(conn, agent_id, client)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for `GET /api/agents/{agentId}/feedback/authorizations/{client}`.
pub async fn get_authorization_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((agent_id, client)): Path<(AgentId, String)>,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let client = Address::new(&client);
    let response =
        run_blocking(state, move |conn| authorization_state(conn, agent_id, client)).await?;
    Ok(Json(response))
}

/// Handler for `DELETE /api/agents/{agentId}/feedback/authorizations/{client}`.
pub async fn revoke_authorization_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(caller): Caller,
    Path((agent_id, client)): Path<(AgentId, String)>,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let client = Address::new(&client);
    let response = run_blocking(state, move |conn| {
        revoke_feedback_authorization(conn, agent_id, &client, &caller)?;
        authorization_state(conn, agent_id, client)
    })
    .await?;
    Ok(Json(response))
}

/// Handler for `POST /api/agents/{agentId}/feedback`.
pub async fn submit_feedback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(reviewer): Caller,
    Path(agent_id): Path<AgentId>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<SubmitFeedbackResponse>), ApiError> {
    let score = score_from(payload.score)?;
    let data_hash = resolve_digest(
        "dataHash",
        payload.data_hash.as_deref(),
        payload.data.as_ref(),
    )?;

    let index = run_blocking(state, move |conn| {
        Ok(submit_feedback(
            conn,
            agent_id,
            score,
            &payload.tags,
            &payload.data_uri,
            &data_hash,
            &reviewer,
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(SubmitFeedbackResponse { index })))
}

/// Handler for `GET /api/agents/{agentId}/feedback`.
pub async fn list_feedback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<FeedbackListResponse>, ApiError> {
    let feedback = run_blocking(state, move |conn| Ok(get_agent_feedback(conn, agent_id)?)).await?;
    let count = feedback.len();
    Ok(Json(FeedbackListResponse { feedback, count }))
}

/// Handler for `GET /api/agents/{agentId}/feedback/{index}`.
pub async fn get_feedback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((agent_id, index)): Path<(AgentId, u64)>,
) -> Result<Json<Feedback>, ApiError> {
    let entry = run_blocking(state, move |conn| Ok(get_feedback(conn, agent_id, index)?)).await?;
    Ok(Json(entry))
}

/// Handler for `GET /api/agents/{agentId}/reputation`.
pub async fn reputation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<ReputationResponse>, ApiError> {
    let response = run_blocking(state, move |conn| {
        Ok(ReputationResponse {
            agent_id,
            average_score: get_average_score(conn, agent_id)?,
            feedback_count: get_feedback_count(conn, agent_id)?,
        })
    })
    .await?;
    Ok(Json(response))
}

/// Handler for `GET /api/feedback/count`.
pub async fn total_feedback_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TotalResponse>, ApiError> {
    let total = run_blocking(state, |conn| Ok(total_feedback(conn)?)).await?;
    Ok(Json(TotalResponse { total }))
}
