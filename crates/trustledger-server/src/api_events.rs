//! Event log endpoint.
//!
//! `GET /api/events` pages through committed registry mutations in commit
//! order. Clients follow the log by passing the last `seq` they saw as
//! `after_seq`.

use crate::api::{run_blocking, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json, Query};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trustledger_events::{query_events, EventFilter, LedgerEvent, Registry, DEFAULT_QUERY_LIMIT};

/// Largest page a single request may ask for.
const MAX_QUERY_LIMIT: i64 = 1000;

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Filter by registry (`IDENTITY`, `REPUTATION`, `VALIDATION`).
    pub registry: Option<String>,
    /// Filter by event type (e.g., `FEEDBACK_SUBMITTED`).
    pub event_type: Option<String>,
    /// Filter by agent id or request id.
    pub entity_id: Option<String>,
    /// Only events after this sequence number.
    pub after_seq: Option<i64>,
    /// Maximum number of events to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

/// Response wrapper for paginated event retrieval.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    /// The matching events in commit order.
    pub events: Vec<LedgerEvent>,
    /// The number of events returned.
    pub count: usize,
}

/// Handler for `GET /api/events`.
pub async fn get_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let registry = match params.registry.as_deref() {
        Some(r) => Some(r.parse::<Registry>().map_err(|_| {
            ApiError::BadRequest(format!(
                "invalid registry: {}. Expected one of: IDENTITY, REPUTATION, VALIDATION",
                r
            ))
        })?),
        None => None,
    };

    let filter = EventFilter {
        registry,
        event_type: params.event_type,
        entity_id: params.entity_id,
        after_seq: params.after_seq,
        limit: Some(
            params
                .limit
                .unwrap_or(DEFAULT_QUERY_LIMIT)
                .clamp(1, MAX_QUERY_LIMIT),
        ),
    };

    let events = run_blocking(state, move |conn| {
        query_events(conn, &filter).map_err(|e| ApiError::InternalServerError(e.to_string()))
    })
    .await?;

    let count = events.len();
    Ok(Json(EventsResponse { events, count }))
}
