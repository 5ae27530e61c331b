//! TrustLedger HTTP service.
//!
//! Exposes the identity, reputation and validation registries as JSON
//! endpoints. Registry calls are synchronous SQLite transactions, so every
//! handler runs its work on the blocking pool.

pub mod api;
pub mod api_events;
pub mod api_identity;
pub mod api_reputation;
pub mod api_validation;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trustledger_db::{open_ledger, DbPool, PoolError};

use crate::config::DatabaseConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
}

impl AppState {
    /// Opens the configured ledger store, migrated and checked.
    ///
    /// # Errors
    ///
    /// Returns a [`PoolError`] if the store cannot be opened or is damaged.
    pub fn open(database: &DatabaseConfig) -> Result<Self, PoolError> {
        let pool = open_ledger(&database.path, database.runtime_settings())?;
        Ok(Self { pool })
    }
}

/// Maximum request body size (256 KiB). Registry payloads are small.
const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let identity_routes = Router::new()
        .route("/api/agents", post(api_identity::register_agent_handler))
        .route("/api/agents/count", get(api_identity::total_agents_handler))
        .route(
            "/api/agents/by-domain/{domain}",
            get(api_identity::get_agent_by_domain_handler),
        )
        .route("/api/agents/{agentId}", get(api_identity::get_agent_handler))
        .route(
            "/api/agents/{agentId}/uri",
            put(api_identity::update_agent_uri_handler),
        )
        .route(
            "/api/agents/{agentId}/deactivate",
            post(api_identity::deactivate_agent_handler),
        )
        .route(
            "/api/agents/{agentId}/registration",
            get(api_identity::get_registration_handler),
        )
        .route(
            "/api/agents/{agentId}/trust",
            get(api_identity::trust_summary_handler),
        );

    let reputation_routes = Router::new()
        .route(
            "/api/agents/{agentId}/feedback/authorizations",
            post(api_reputation::authorize_feedback_handler),
        )
        .route(
            "/api/agents/{agentId}/feedback/authorizations/{client}",
            get(api_reputation::get_authorization_handler)
                .delete(api_reputation::revoke_authorization_handler),
        )
        .route(
            "/api/agents/{agentId}/feedback",
            post(api_reputation::submit_feedback_handler)
                .get(api_reputation::list_feedback_handler),
        )
        .route(
            "/api/agents/{agentId}/feedback/{index}",
            get(api_reputation::get_feedback_handler),
        )
        .route(
            "/api/agents/{agentId}/reputation",
            get(api_reputation::reputation_handler),
        )
        .route(
            "/api/feedback/count",
            get(api_reputation::total_feedback_handler),
        );

    let validation_routes = Router::new()
        .route(
            "/api/validations",
            post(api_validation::request_validation_handler),
        )
        .route(
            "/api/validations/count",
            get(api_validation::total_requests_handler),
        )
        .route(
            "/api/validations/{requestId}",
            get(api_validation::get_request_handler),
        )
        .route(
            "/api/validations/{requestId}/response",
            post(api_validation::submit_response_handler)
                .get(api_validation::get_response_handler),
        )
        .route(
            "/api/validations/{requestId}/completed",
            get(api_validation::is_completed_handler),
        )
        .route(
            "/api/agents/{agentId}/validations",
            get(api_validation::agent_requests_handler),
        )
        .route(
            "/api/agents/{agentId}/validation-score",
            get(api_validation::validation_score_handler),
        )
        .route(
            "/api/validators/{validatorId}/requests",
            get(api_validation::validator_requests_handler),
        );

    Router::new()
        .route("/health", get(health))
        .route("/api/events", get(api_events::get_events_handler))
        .merge(identity_routes)
        .merge(reputation_routes)
        .merge(validation_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
