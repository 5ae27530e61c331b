//! Shared API plumbing: error mapping, blocking execution, digest inputs.

use crate::AppState;
use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use trustledger_identity::IdentityError;
use trustledger_reputation::ReputationError;
use trustledger_types::{Digest, ErrorKind};
use trustledger_validation::ValidationError;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A registry rejected the operation.
    #[error("{message}")]
    Registry { kind: ErrorKind, message: String },
    /// The `X-Ledger-Caller` header was missing or unreadable.
    #[error("missing caller identity")]
    Unauthenticated,
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::NotFound | ErrorKind::OutOfRange => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Registry { kind, .. } => (status_for(*kind), kind.as_str()),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidArgument.as_str(),
            ),
            ApiError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "code": code,
        }));

        (status, body).into_response()
    }
}

macro_rules! impl_from_registry_error {
    ($($err:ty),*) => {
        $(
            impl From<$err> for ApiError {
                fn from(e: $err) -> Self {
                    ApiError::Registry {
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                }
            }
        )*
    };
}

impl_from_registry_error!(IdentityError, ReputationError, ValidationError);

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Registry {
            kind: ErrorKind::Storage,
            message: format!("database error: {}", e),
        }
    }
}

/// Runs `f` on the blocking pool with a pooled connection.
pub(crate) async fn run_blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = state
            .pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}

/// Resolves a content digest supplied either as a hex string or as a JSON
/// document to hash. The explicit hash wins when both are present.
pub(crate) fn resolve_digest(
    field: &str,
    hash: Option<&str>,
    data: Option<&Value>,
) -> Result<Digest, ApiError> {
    match (hash, data) {
        (Some(hex), _) => Digest::from_hex(hex)
            .map_err(|e| ApiError::BadRequest(format!("{}: {}", field, e))),
        (None, Some(data)) => Ok(Digest::of_json(data)),
        (None, None) => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

/// Narrows a JSON score to the registry's `u8`.
pub(crate) fn score_from(raw: u32) -> Result<u8, ApiError> {
    u8::try_from(raw)
        .map_err(|_| ApiError::BadRequest(format!("score {} exceeds the maximum of 100", raw)))
}
