use axum::{extract::FromRequestParts, http::request::Parts};
use trustledger_types::Address;

use crate::api::ApiError;

/// Header carrying the caller identity asserted by the authenticating proxy.
pub const CALLER_HEADER: &str = "X-Ledger-Caller";

/// The authenticated caller of a mutating request.
///
/// The service does not verify signatures; whatever sits in front of it is
/// trusted to have authenticated the caller and set [`CALLER_HEADER`].
/// Handlers that take a `Caller` reject requests without the header with
/// `401 Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Address);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(ApiError::Unauthenticated)?
            .to_str()
            .map_err(|_| ApiError::Unauthenticated)?;

        let address = Address::new(value);
        if address.as_str().is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(Caller(address))
    }
}
