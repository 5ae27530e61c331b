//! Validation registry endpoints.

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
use trustledger_types::{AgentId, RequestId};
use trustledger_validation::{
    get_agent_validation_requests, get_average_validation_score, get_validation_request,
    get_validation_response, get_validator_requests, is_validation_completed, request_validation,
    submit_validation_response, total_validation_requests, ValidationRequest, ValidationResponse,
    ValidationStatus,
};

/// Request body for opening a validation. The caller is the requester.
///
/// The request hash may be given directly or derived from the work payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidationRequest {
    pub agent_id: AgentId,
    pub validator_id: AgentId,
    pub request_uri: String,
    pub request_hash: Option<String>,
    pub request_data: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidationResponse {
    pub request_id: RequestId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    pub score: u32,
    #[serde(default)]
    pub response_uri: String,
    pub response_hash: Option<String>,
    pub response_data: Option<Value>,
}

/// A request together with its derived lifecycle state.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationRequestView {
    #[serde(flatten)]
    pub request: ValidationRequest,
    pub status: ValidationStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedResponse {
    pub request_id: RequestId,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListResponse {
    pub request_ids: Vec<RequestId>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationScoreResponse {
    pub agent_id: AgentId,
    pub average_score: u8,
}

/// Handler for `POST /api/validations`.
pub async fn request_validation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Caller(requester): Caller,
    Json(payload): Json<RequestValidationRequest>,
) -> Result<(StatusCode, Json<RequestValidationResponse>), ApiError> {
    let request_hash = resolve_digest(
        "requestHash",
        payload.request_hash.as_deref(),
        payload.request_data.as_ref(),
    )?;

    let request_id = run_blocking(state, move |conn| {
        Ok(request_validation(
            conn,
            payload.agent_id,
            payload.validator_id,
            &payload.request_uri,
            &request_hash,
            &requester,
        )?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestValidationResponse { request_id }),
    ))
}

/// Handler for `GET /api/validations/count`.
pub async fn total_requests_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<TotalResponse>, ApiError> {
    let total = run_blocking(state, |conn| Ok(total_validation_requests(conn)?)).await?;
    Ok(Json(TotalResponse { total }))
}

/// Handler for `GET /api/validations/{requestId}`.
pub async fn get_request_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
) -> Result<Json<ValidationRequestView>, ApiError> {
    let request =
        run_blocking(state, move |conn| Ok(get_validation_request(conn, request_id)?)).await?;
    let status = request.status();
    Ok(Json(ValidationRequestView { request, status }))
}

/// Handler for `POST /api/validations/{requestId}/response`.
///
/// The response carries no caller check; the validator is copied from the
/// request.
pub async fn submit_response_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<(StatusCode, Json<ValidationResponse>), ApiError> {
    let score = score_from(payload.score)?;
    let response_hash = resolve_digest(
        "responseHash",
        payload.response_hash.as_deref(),
        payload.response_data.as_ref(),
    )?;

    let response = run_blocking(state, move |conn| {
        submit_validation_response(
            conn,
            request_id,
            score,
            &payload.response_uri,
            &response_hash,
        )?;
        Ok(get_validation_response(conn, request_id)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for `GET /api/validations/{requestId}/response`.
pub async fn get_response_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let response =
        run_blocking(state, move |conn| Ok(get_validation_response(conn, request_id)?)).await?;
    Ok(Json(response))
}

/// Handler for `GET /api/validations/{requestId}/completed`.
pub async fn is_completed_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
) -> Result<Json<CompletedResponse>, ApiError> {
    let completed =
        run_blocking(state, move |conn| Ok(is_validation_completed(conn, request_id)?)).await?;
    Ok(Json(CompletedResponse {
        request_id,
        completed,
    }))
}

/// Handler for `GET /api/agents/{agentId}/validations`.
pub async fn agent_requests_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let request_ids = run_blocking(state, move |conn| {
        Ok(get_agent_validation_requests(conn, agent_id)?)
    })
    .await?;
    let count = request_ids.len();
    Ok(Json(RequestListResponse { request_ids, count }))
}

/// Handler for `GET /api/validators/{validatorId}/requests`.
pub async fn validator_requests_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(validator_id): Path<AgentId>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let request_ids =
        run_blocking(state, move |conn| Ok(get_validator_requests(conn, validator_id)?)).await?;
    let count = request_ids.len();
    Ok(Json(RequestListResponse { request_ids, count }))
}

/// Handler for `GET /api/agents/{agentId}/validation-score`.
pub async fn validation_score_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<AgentId>,
) -> Result<Json<ValidationScoreResponse>, ApiError> {
    let average_score = run_blocking(state, move |conn| {
        Ok(get_average_validation_score(conn, agent_id)?)
    })
    .await?;
    Ok(Json(ValidationScoreResponse {
        agent_id,
        average_score,
    }))
}
